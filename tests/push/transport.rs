//! Web Push transport against a local push service: request framing, VAPID
//! header, end-to-end decryption and status classification.

#[path = "../common/mod.rs"]
mod common;

use std::sync::{Arc, Mutex};

use aes_gcm::{
    Aes128Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use axum::{
    Router,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::post,
};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hkdf::Hkdf;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::{PublicKey, SecretKey};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha256;

use common::*;
use salesbot::push::{VapidKey, WebPushTransport};

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<(HeaderMap, Bytes)>>>);

async fn push_service(
    State(captured): State<Captured>,
    Path(status): Path<u16>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    captured.0.lock().unwrap().push((headers, body));
    StatusCode::from_u16(status).unwrap()
}

/// Local stand-in for a browser push service. `POST /push/{status}` answers
/// with that status.
async fn spawn_push_service() -> (String, Captured) {
    let captured = Captured::default();
    let app = Router::new()
        .route("/push/{status}", post(push_service))
        .with_state(captured.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), captured)
}

struct Subscriber {
    secret: SecretKey,
    auth: [u8; 16],
}

impl Subscriber {
    fn new() -> Self {
        let mut auth = [0u8; 16];
        OsRng.fill_bytes(&mut auth);
        Self {
            secret: SecretKey::random(&mut OsRng),
            auth,
        }
    }

    fn subscription(&self, endpoint: String) -> PushSubscription {
        PushSubscription {
            id: "sub".to_string(),
            endpoint,
            keys: SubscriptionKeys {
                p256dh: URL_SAFE_NO_PAD
                    .encode(self.secret.public_key().to_encoded_point(false).as_bytes()),
                auth: URL_SAFE_NO_PAD.encode(self.auth),
            },
            created_at: 0,
            last_used_at: None,
        }
    }

    /// Browser side of aes128gcm decryption.
    fn decrypt(&self, body: &[u8]) -> Vec<u8> {
        let (salt, rest) = body.split_at(16);
        let record_size = u32::from_be_bytes(rest[..4].try_into().unwrap());
        assert_eq!(record_size, 4096);
        let key_id_len = rest[4] as usize;
        let (sender_key, ciphertext) = rest[5..].split_at(key_id_len);

        let sender = PublicKey::from_sec1_bytes(sender_key).unwrap();
        let shared =
            p256::ecdh::diffie_hellman(self.secret.to_nonzero_scalar(), sender.as_affine());

        let mut info = b"WebPush: info\0".to_vec();
        info.extend_from_slice(self.secret.public_key().to_encoded_point(false).as_bytes());
        info.extend_from_slice(sender_key);
        let mut ikm = [0u8; 32];
        Hkdf::<Sha256>::new(Some(&self.auth[..]), shared.raw_secret_bytes().as_slice())
            .expand(&info, &mut ikm)
            .unwrap();

        let prk = Hkdf::<Sha256>::new(Some(salt), &ikm);
        let mut cek = [0u8; 16];
        let mut nonce = [0u8; 12];
        prk.expand(b"Content-Encoding: aes128gcm\0", &mut cek).unwrap();
        prk.expand(b"Content-Encoding: nonce\0", &mut nonce).unwrap();

        let mut plaintext = Aes128Gcm::new_from_slice(&cek)
            .unwrap()
            .decrypt(Nonce::from_slice(&nonce), ciphertext)
            .unwrap();
        assert_eq!(plaintext.pop(), Some(0x02), "last record delimiter");
        plaintext
    }
}

fn transport() -> (WebPushTransport, String) {
    let (private_key, public_key) = VapidKey::generate();
    let vapid = VapidKey::from_base64(&private_key).unwrap();
    let config = PushConfig {
        vapid_subject: "mailto:ventas@example.com".to_string(),
        ttl_secs: 3600,
        ..PushConfig::default()
    };
    (WebPushTransport::new(vapid, &config).unwrap(), public_key)
}

#[tokio::test]
async fn test_delivered_message_decrypts_for_subscriber() {
    let (base, captured) = spawn_push_service().await;
    let (transport, public_key) = transport();
    let subscriber = Subscriber::new();
    let payload = br#"{"title":"Nueva venta","body":"Guia vendida","url":"/"}"#;

    transport
        .send(&subscriber.subscription(format!("{}/push/201", base)), payload)
        .await
        .expect("201 should count as delivered");

    let requests = captured.0.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    let (headers, body) = &requests[0];

    assert_eq!(headers["content-encoding"], "aes128gcm");
    assert_eq!(headers["content-type"], "application/octet-stream");
    assert_eq!(headers["ttl"], "3600");
    assert_eq!(headers["urgency"], "normal");

    let authorization = headers["authorization"].to_str().unwrap();
    assert!(authorization.starts_with("vapid t="));
    assert!(authorization.ends_with(&format!(", k={}", public_key)));

    assert_eq!(subscriber.decrypt(body), payload);
}

#[tokio::test]
async fn test_gone_statuses_are_permanent() {
    let (base, _captured) = spawn_push_service().await;
    let (transport, _) = transport();
    let subscriber = Subscriber::new();

    for status in [404u16, 410] {
        let err = transport
            .send(&subscriber.subscription(format!("{}/push/{}", base, status)), b"{}")
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::Gone(s) if s == status));
        assert!(err.is_permanent());
    }
}

#[tokio::test]
async fn test_other_statuses_are_transient() {
    let (base, _captured) = spawn_push_service().await;
    let (transport, _) = transport();
    let subscriber = Subscriber::new();

    for status in [400u16, 403, 413, 429, 500, 503] {
        let err = transport
            .send(&subscriber.subscription(format!("{}/push/{}", base, status)), b"{}")
            .await
            .unwrap_err();
        assert!(
            matches!(err, DeliveryError::Rejected { status: s } if s == status),
            "{} should be rejected, got {:?}",
            status,
            err
        );
        assert!(!err.is_permanent());
    }
}

#[tokio::test]
async fn test_unreachable_service_is_transient() {
    // Bind and drop to get a port nothing listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (transport, _) = transport();
    let err = transport
        .send(
            &Subscriber::new().subscription(format!("http://{}/push/201", addr)),
            b"{}",
        )
        .await
        .unwrap_err();

    assert!(!err.is_permanent());
}
