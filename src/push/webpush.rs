//! Web Push transport: RFC 8291 message encryption and RFC 8292 VAPID.
//!
//! Encrypted body layout (`aes128gcm` content coding, single record):
//! salt (16) || record size (4, BE) || key id length (1) || sender public key (65) || ciphertext

use std::time::Duration as StdDuration;

use aes_gcm::{
    Aes128Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hkdf::Hkdf;
use jwt_simple::prelude::*;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::{PublicKey, SecretKey};
use rand::RngCore;
use rand::rngs::OsRng;
use reqwest::{Client, StatusCode, Url};
use sha2::Sha256;

use super::{DeliveryError, PushTransport};
use crate::config::PushConfig;
use crate::error::{AppError, Result};
use crate::models::PushSubscription;

/// Record size advertised in the header. One record carries the whole message.
const RECORD_SIZE: u32 = 4096;

const SALT_SIZE: usize = 16;
const TAG_SIZE: usize = 16;
const AUTH_SECRET_SIZE: usize = 16;
const UNCOMPRESSED_POINT_SIZE: usize = 65;
const HEADER_SIZE: usize = SALT_SIZE + 4 + 1 + UNCOMPRESSED_POINT_SIZE;

/// Largest plaintext that fits the 4096-byte body push services accept.
pub const MAX_PAYLOAD_SIZE: usize = 4096 - HEADER_SIZE - TAG_SIZE - 1;

/// Padding delimiter for the final (and only) record.
const LAST_RECORD_DELIMITER: u8 = 0x02;

/// VAPID JWT lifetime. Push services reject anything over 24h.
const VAPID_TOKEN_HOURS: u64 = 12;

/// Decode base64url, tolerating padding and the standard alphabet since
/// browsers and libraries disagree.
pub fn decode_base64url(input: &str) -> std::result::Result<Vec<u8>, base64::DecodeError> {
    let normalized: String = input
        .trim()
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            c => c,
        })
        .collect();
    URL_SAFE_NO_PAD.decode(normalized)
}

/// Encrypt `plaintext` for a subscriber per RFC 8291.
///
/// `ua_public` is the subscriber's uncompressed P-256 key (`p256dh`),
/// `auth_secret` the 16-byte `auth` value.
pub fn encrypt_payload(
    ua_public: &[u8],
    auth_secret: &[u8],
    plaintext: &[u8],
) -> std::result::Result<Vec<u8>, DeliveryError> {
    let mut salt = [0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut salt);
    let sender = SecretKey::random(&mut OsRng);
    encrypt_with(ua_public, auth_secret, plaintext, &sender, &salt)
}

fn encrypt_with(
    ua_public: &[u8],
    auth_secret: &[u8],
    plaintext: &[u8],
    sender: &SecretKey,
    salt: &[u8; SALT_SIZE],
) -> std::result::Result<Vec<u8>, DeliveryError> {
    if plaintext.len() > MAX_PAYLOAD_SIZE {
        return Err(DeliveryError::PayloadTooLarge(plaintext.len()));
    }
    if auth_secret.len() != AUTH_SECRET_SIZE {
        return Err(DeliveryError::InvalidSubscription(format!(
            "auth secret must be {} bytes, got {}",
            AUTH_SECRET_SIZE,
            auth_secret.len()
        )));
    }

    let ua_key = PublicKey::from_sec1_bytes(ua_public).map_err(|_| {
        DeliveryError::InvalidSubscription("p256dh is not a valid P-256 public key".into())
    })?;
    let ua_point = ua_key.to_encoded_point(false);
    let sender_point = sender.public_key().to_encoded_point(false);

    let shared = p256::ecdh::diffie_hellman(sender.to_nonzero_scalar(), ua_key.as_affine());

    // IKM = HKDF(auth_secret, ecdh_secret, "WebPush: info" || 0x00 || ua_public || as_public)
    let mut key_info = Vec::with_capacity(14 + 2 * UNCOMPRESSED_POINT_SIZE);
    key_info.extend_from_slice(b"WebPush: info\0");
    key_info.extend_from_slice(ua_point.as_bytes());
    key_info.extend_from_slice(sender_point.as_bytes());

    let mut ikm = [0u8; 32];
    Hkdf::<Sha256>::new(Some(auth_secret), shared.raw_secret_bytes().as_slice())
        .expand(&key_info, &mut ikm)
        .map_err(|_| DeliveryError::Transport("HKDF expand failed".into()))?;

    let prk = Hkdf::<Sha256>::new(Some(salt.as_slice()), &ikm);
    let mut cek = [0u8; 16];
    let mut nonce = [0u8; 12];
    prk.expand(b"Content-Encoding: aes128gcm\0", &mut cek)
        .and_then(|_| prk.expand(b"Content-Encoding: nonce\0", &mut nonce))
        .map_err(|_| DeliveryError::Transport("HKDF expand failed".into()))?;

    let mut record = Vec::with_capacity(plaintext.len() + 1);
    record.extend_from_slice(plaintext);
    record.push(LAST_RECORD_DELIMITER);

    let cipher = Aes128Gcm::new_from_slice(&cek)
        .map_err(|e| DeliveryError::Transport(format!("Failed to create cipher: {}", e)))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), record.as_slice())
        .map_err(|e| DeliveryError::Transport(format!("Encryption failed: {}", e)))?;

    let mut body = Vec::with_capacity(HEADER_SIZE + ciphertext.len());
    body.extend_from_slice(salt);
    body.extend_from_slice(&RECORD_SIZE.to_be_bytes());
    body.push(UNCOMPRESSED_POINT_SIZE as u8);
    body.extend_from_slice(sender_point.as_bytes());
    body.extend_from_slice(&ciphertext);
    Ok(body)
}

/// Map a push service response status to a delivery outcome.
///
/// Only 404 and 410 mean the subscription is dead. Rate limiting, auth
/// problems and server errors are all retryable.
pub fn classify_status(status: StatusCode) -> std::result::Result<(), DeliveryError> {
    if status.is_success() {
        return Ok(());
    }
    match status {
        StatusCode::NOT_FOUND | StatusCode::GONE => Err(DeliveryError::Gone(status.as_u16())),
        _ => Err(DeliveryError::Rejected {
            status: status.as_u16(),
        }),
    }
}

// ============ VAPID ============

/// Application server key pair used to sign VAPID tokens.
#[derive(Clone)]
pub struct VapidKey {
    key_pair: std::sync::Arc<ES256KeyPair>,
    public_key: String,
}

impl VapidKey {
    /// Load from a base64url raw 32-byte P-256 scalar (the format printed
    /// by `salesbot gen-vapid-keys` and most web-push tooling).
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let raw = decode_base64url(encoded)
            .map_err(|e| AppError::Internal(format!("Invalid VAPID key encoding: {}", e)))?;

        let secret = SecretKey::from_slice(&raw)
            .map_err(|_| AppError::Internal("VAPID key is not a valid P-256 scalar".into()))?;
        let key_pair = ES256KeyPair::from_bytes(&secret.to_bytes())
            .map_err(|e| AppError::Internal(format!("Failed to load VAPID key: {}", e)))?;
        let public_key = URL_SAFE_NO_PAD.encode(secret.public_key().to_encoded_point(false).as_bytes());

        Ok(Self {
            key_pair: std::sync::Arc::new(key_pair),
            public_key,
        })
    }

    /// Generate a new key pair. Returns (private, public), both base64url.
    pub fn generate() -> (String, String) {
        let secret = SecretKey::random(&mut OsRng);
        let private_b64 = URL_SAFE_NO_PAD.encode(secret.to_bytes());
        let public_b64 = URL_SAFE_NO_PAD.encode(secret.public_key().to_encoded_point(false).as_bytes());
        (private_b64, public_b64)
    }

    /// Uncompressed public key, base64url. Browsers pass this as
    /// `applicationServerKey` when subscribing.
    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    /// `Authorization` header value for a request to `endpoint`.
    pub fn authorization(
        &self,
        endpoint: &str,
        subject: &str,
    ) -> std::result::Result<String, DeliveryError> {
        let url = Url::parse(endpoint)
            .map_err(|e| DeliveryError::InvalidSubscription(format!("Invalid endpoint URL: {}", e)))?;
        let audience = url.origin().ascii_serialization();

        let claims = Claims::create(Duration::from_hours(VAPID_TOKEN_HOURS))
            .with_audience(audience)
            .with_subject(subject);
        let token = self
            .key_pair
            .sign(claims)
            .map_err(|e| DeliveryError::Transport(format!("Failed to sign VAPID token: {}", e)))?;

        Ok(format!("vapid t={}, k={}", token, self.public_key))
    }
}

// ============ Transports ============

/// Delivers encrypted messages over HTTPS to browser push services.
#[derive(Clone)]
pub struct WebPushTransport {
    client: Client,
    vapid: VapidKey,
    subject: String,
    ttl_secs: u32,
    timeout: StdDuration,
}

impl WebPushTransport {
    pub fn new(vapid: VapidKey, config: &PushConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(StdDuration::from_secs(5))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            vapid,
            subject: config.vapid_subject.clone(),
            ttl_secs: config.ttl_secs,
            timeout: config.timeout,
        })
    }
}

#[async_trait]
impl PushTransport for WebPushTransport {
    async fn send(
        &self,
        subscription: &PushSubscription,
        payload: &[u8],
    ) -> std::result::Result<(), DeliveryError> {
        let ua_public = decode_base64url(&subscription.keys.p256dh)
            .map_err(|e| DeliveryError::InvalidSubscription(format!("p256dh: {}", e)))?;
        let auth_secret = decode_base64url(&subscription.keys.auth)
            .map_err(|e| DeliveryError::InvalidSubscription(format!("auth: {}", e)))?;

        let body = encrypt_payload(&ua_public, &auth_secret, payload)?;
        let authorization = self.vapid.authorization(&subscription.endpoint, &self.subject)?;

        let response = self
            .client
            .post(&subscription.endpoint)
            .header("TTL", self.ttl_secs.to_string())
            .header("Content-Encoding", "aes128gcm")
            .header("Content-Type", "application/octet-stream")
            .header("Urgency", "normal")
            .header("Authorization", authorization)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DeliveryError::Timeout(self.timeout)
                } else {
                    DeliveryError::Transport(e.to_string())
                }
            })?;

        classify_status(response.status())
    }
}

/// Stand-in when no VAPID key is configured. Every attempt fails
/// transiently, so nothing is ever pruned.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledTransport;

#[async_trait]
impl PushTransport for DisabledTransport {
    async fn send(
        &self,
        _subscription: &PushSubscription,
        _payload: &[u8],
    ) -> std::result::Result<(), DeliveryError> {
        Err(DeliveryError::NotConfigured)
    }
}
