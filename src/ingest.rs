//! Webhook ingestion: verify, parse, store.
//!
//! Per request: `Received -> Verified | Rejected -> Stored`. Nothing is
//! parsed before the signature over the raw bytes has been checked, and
//! nothing is stored unless it parsed. Notification fan-out is a separate
//! operator action and never runs on this path.

use std::sync::Arc;

use serde::Deserialize;

use crate::config::WebhookConfig;
use crate::crypto::WebhookVerifier;
use crate::error::{AppError, Result};
use crate::models::{Buyer, EventType, NewPurchaseEvent, ProductInfo};
use crate::store::{EventStore, RecordedEvent};

/// Header carrying the hex HMAC-SHA256 of the raw body.
pub const SIGNATURE_HEADER: &str = "x-signature";

#[derive(Debug, Clone)]
enum SignatureMode {
    Enforced(WebhookVerifier),
    /// No secret configured: nothing can be verified, so everything is rejected.
    NoSecret,
    /// Dev-only bypass. Every request is accepted unverified.
    InsecureSkip,
}

pub struct IngestionService {
    mode: SignatureMode,
    events: Arc<dyn EventStore>,
}

impl IngestionService {
    pub fn new(config: &WebhookConfig, events: Arc<dyn EventStore>) -> Self {
        let mode = if config.insecure_skip_verify {
            tracing::warn!("============================================");
            tracing::warn!("WEBHOOK SIGNATURE VERIFICATION IS DISABLED");
            tracing::warn!("Any caller can inject purchase events.");
            tracing::warn!("Never run this configuration in production.");
            tracing::warn!("============================================");
            SignatureMode::InsecureSkip
        } else {
            match &config.secret {
                Some(secret) => SignatureMode::Enforced(WebhookVerifier::new(secret)),
                None => {
                    tracing::warn!("WEBHOOK_SECRET not set: all webhooks will be rejected");
                    SignatureMode::NoSecret
                }
            }
        };

        Self { mode, events }
    }

    /// Run one webhook through the pipeline.
    ///
    /// Returns the stored row on success. `Created` vs `Updated` is
    /// informational only; both mean the delivery was accepted.
    pub fn ingest(&self, body: &[u8], signature: Option<&str>) -> Result<RecordedEvent> {
        self.verify(body, signature)?;

        let event = match parse_event(body) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(
                    "Malformed webhook rejected: {} body={}",
                    e,
                    String::from_utf8_lossy(body)
                );
                return Err(e);
            }
        };

        let recorded = match self.events.record_event(&event) {
            Ok(recorded) => recorded,
            Err(e) => {
                if e.is_storage_failure() {
                    tracing::error!(
                        "Webhook not stored (transaction={:?}), sender must retry: {}",
                        event.transaction_id,
                        e
                    );
                }
                return Err(e);
            }
        };

        tracing::info!(
            "Webhook stored: event={}, transaction={:?}, id={}, result={:?}",
            event.event_type.as_str(),
            event.transaction_id,
            recorded.id,
            recorded.result
        );

        Ok(recorded)
    }

    fn verify(&self, body: &[u8], signature: Option<&str>) -> Result<()> {
        match &self.mode {
            SignatureMode::Enforced(verifier) => {
                let Some(signature) = signature else {
                    tracing::warn!("Webhook rejected: missing {} header", SIGNATURE_HEADER);
                    return Err(AppError::Unauthorized);
                };
                if !verifier.verify(body, signature) {
                    tracing::warn!("Webhook rejected: invalid signature");
                    return Err(AppError::Unauthorized);
                }
                Ok(())
            }
            SignatureMode::NoSecret => {
                tracing::warn!("Webhook rejected: no webhook secret configured");
                Err(AppError::Unauthorized)
            }
            SignatureMode::InsecureSkip => {
                tracing::warn!("Webhook accepted WITHOUT signature verification (insecure dev mode)");
                Ok(())
            }
        }
    }
}

// ============ Payload Parsing ============

/// Platform envelope. `buyer` / `product` / `transaction` may sit at the top
/// level or be nested under `data`; a nested object wins over its top-level
/// counterpart, field by field.
#[derive(Debug, Deserialize)]
struct WebhookEnvelope {
    event: String,
    #[serde(default)]
    data: Option<WebhookBody>,
    #[serde(flatten)]
    body: WebhookBody,
}

#[derive(Debug, Default, Deserialize)]
struct WebhookBody {
    #[serde(default)]
    buyer: Option<Buyer>,
    #[serde(default)]
    product: Option<ProductPayload>,
    #[serde(default)]
    transaction: Option<TransactionPayload>,
}

#[derive(Debug, Deserialize)]
struct ProductPayload {
    name: Option<String>,
    price: Option<Scalar>,
    currency: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TransactionPayload {
    transaction_id: Option<Scalar>,
    purchase_date: Option<Scalar>,
}

impl WebhookBody {
    fn merge(self, fallback: WebhookBody) -> WebhookBody {
        WebhookBody {
            buyer: self.buyer.or(fallback.buyer),
            product: self.product.or(fallback.product),
            transaction: self.transaction.or(fallback.transaction),
        }
    }
}

/// Largest integer an `f64` represents exactly.
const MAX_EXACT_FLOAT_INT: f64 = 9_007_199_254_740_992.0;

/// Platforms are inconsistent about quoting numbers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
}

impl Scalar {
    fn into_text(self) -> Option<String> {
        let text = match self {
            Scalar::Int(n) => n.to_string(),
            Scalar::UInt(n) => n.to_string(),
            Scalar::Float(f) => f.to_string(),
            Scalar::Text(s) => s.trim().to_string(),
        };
        Some(text).filter(|s| !s.is_empty())
    }

    /// Exact text of an identifier. Floats are only accepted when they are
    /// whole numbers an `f64` holds exactly, otherwise two ids could collapse
    /// into one key.
    fn into_id(self) -> Result<Option<String>> {
        match self {
            Scalar::Float(f) if f.fract() == 0.0 && f.abs() <= MAX_EXACT_FLOAT_INT => {
                Ok(Some(format!("{}", f as i64)))
            }
            Scalar::Float(f) => Err(AppError::BadRequest(format!(
                "transaction.transaction_id is not an exact integer: {}",
                f
            ))),
            other => Ok(other.into_text()),
        }
    }

    fn into_number(self) -> Result<f64> {
        match self {
            Scalar::Int(n) => Ok(n as f64),
            Scalar::UInt(n) => Ok(n as f64),
            Scalar::Float(f) => Ok(f),
            Scalar::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| AppError::BadRequest(format!("product.price is not a number: {}", s))),
        }
    }
}

/// Parse a verified webhook body into a storable event.
///
/// Fails with `BadRequest` on invalid JSON, a missing or blank `event`, a
/// non-numeric price, or a fractional numeric transaction id.
pub fn parse_event(body: &[u8]) -> Result<NewPurchaseEvent> {
    let raw_payload = std::str::from_utf8(body)
        .map_err(|_| AppError::BadRequest("Body is not valid UTF-8".into()))?
        .to_string();

    let envelope: WebhookEnvelope = serde_json::from_str(&raw_payload)
        .map_err(|e| AppError::BadRequest(format!("Invalid webhook payload: {}", e)))?;

    if envelope.event.trim().is_empty() {
        return Err(AppError::BadRequest("Missing event name".into()));
    }

    let body = match envelope.data {
        Some(data) => data.merge(envelope.body),
        None => envelope.body,
    };

    let product = match body.product {
        Some(p) => ProductInfo {
            name: p.name,
            price: p.price.map(Scalar::into_number).transpose()?,
            currency: p.currency,
        },
        None => ProductInfo::default(),
    };

    let (transaction_id, purchase_date) = match body.transaction {
        Some(t) => (
            t.transaction_id.map(Scalar::into_id).transpose()?.flatten(),
            t.purchase_date.and_then(Scalar::into_text),
        ),
        None => (None, None),
    };

    Ok(NewPurchaseEvent {
        transaction_id,
        event_type: EventType::parse(&envelope.event),
        buyer: body.buyer.unwrap_or_default(),
        product,
        purchase_date,
        raw_payload,
    })
}
