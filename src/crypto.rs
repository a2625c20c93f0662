//! Webhook signature verification and constant-time helpers.
//!
//! Purchase platforms sign the raw request body with HMAC-SHA256 using a
//! shared secret. Verification must run over the exact bytes received:
//! re-serialising the JSON changes the hash.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Verifies `X-Signature` style HMAC-SHA256 signatures.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: Vec<u8>,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier").finish_non_exhaustive()
    }
}

impl WebhookVerifier {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    /// Hex-encoded HMAC-SHA256 of `payload`. Used by tests and by
    /// operators replaying captured bodies.
    pub fn sign(&self, payload: &[u8]) -> String {
        hex::encode(self.mac(payload))
    }

    fn mac(&self, payload: &[u8]) -> Vec<u8> {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC can take key of any size");
        mac.update(payload);
        mac.finalize().into_bytes().to_vec()
    }

    /// Returns true only if `signature` is the hex HMAC of `payload`.
    ///
    /// An optional `sha256=` prefix is accepted. Anything that does not decode
    /// as hex, or decodes to the wrong length, is simply "not matching".
    pub fn verify(&self, payload: &[u8], signature: &str) -> bool {
        let signature = signature.trim();
        let signature = signature.strip_prefix("sha256=").unwrap_or(signature);

        let provided = match hex::decode(signature) {
            Ok(bytes) => bytes,
            Err(_) => return false,
        };

        constant_time_eq(&self.mac(payload), &provided)
    }
}

/// Constant-time byte comparison. Length is not secret: a mismatch returns
/// early.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
