//! Web Push fan-out.
//!
//! [`Dispatcher`] walks the subscription store and hands each entry to a
//! [`PushTransport`]. Endpoints the push service reports as gone are pruned;
//! every other failure leaves the subscription for a later pass.

mod dispatcher;
mod webpush;

pub use dispatcher::Dispatcher;
pub use webpush::{
    DisabledTransport, MAX_PAYLOAD_SIZE, VapidKey, WebPushTransport, classify_status,
    decode_base64url, encrypt_payload,
};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::PushConfig;
use crate::error::Result;
use crate::models::PushSubscription;

/// Why a single delivery attempt failed.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The push service will never accept messages for this endpoint again.
    #[error("Endpoint gone (HTTP {0})")]
    Gone(u16),

    #[error("Push service rejected delivery (HTTP {status})")]
    Rejected { status: u16 },

    #[error("Delivery timed out after {0:?}")]
    Timeout(Duration),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid subscription: {0}")]
    InvalidSubscription(String),

    #[error("Payload too large: {0} bytes")]
    PayloadTooLarge(usize),

    #[error("Push delivery is not configured")]
    NotConfigured,
}

impl DeliveryError {
    /// Permanent failures prune the subscription. Everything else is retryable
    /// on a later pass.
    pub fn is_permanent(&self) -> bool {
        matches!(self, DeliveryError::Gone(_))
    }
}

/// Delivers one already-serialised payload to one subscription.
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn send(
        &self,
        subscription: &PushSubscription,
        payload: &[u8],
    ) -> std::result::Result<(), DeliveryError>;
}

/// Build the transport for `config`, plus the public key browsers need.
///
/// Without a VAPID key every delivery fails transiently and no key is published.
pub fn transport_from_config(
    config: &PushConfig,
) -> Result<(Arc<dyn PushTransport>, Option<String>)> {
    let Some(encoded) = config.vapid_private_key.as_deref() else {
        tracing::warn!("VAPID_PRIVATE_KEY not set: push notifications disabled");
        return Ok((Arc::new(DisabledTransport), None));
    };

    let vapid = VapidKey::from_base64(encoded)?;
    let public_key = vapid.public_key().to_string();
    let transport = WebPushTransport::new(vapid, config)?;
    Ok((Arc::new(transport), Some(public_key)))
}
