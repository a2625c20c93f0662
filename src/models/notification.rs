use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::push::MAX_PAYLOAD_SIZE;

/// A message to fan out to every subscriber. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationJob {
    pub title: String,
    pub body: String,
    /// Page opened when the notification is clicked.
    #[serde(rename = "url", alias = "target_url", alias = "targetUrl", default = "default_target_url")]
    pub target_url: String,
}

fn default_target_url() -> String {
    "/".to_string()
}

impl NotificationJob {
    pub fn new(title: impl Into<String>, body: impl Into<String>, target_url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            target_url: target_url.into(),
        }
    }

    /// Serialized push payload. Rejects a blank title or a payload too large
    /// for a single encrypted record.
    pub fn payload(&self) -> Result<Vec<u8>> {
        if self.title.trim().is_empty() {
            return Err(AppError::BadRequest("title is required".into()));
        }

        let payload = serde_json::to_vec(self)?;
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(AppError::BadRequest(format!(
                "Notification too large: {} bytes (max {})",
                payload.len(),
                MAX_PAYLOAD_SIZE
            )));
        }
        Ok(payload)
    }
}

/// Aggregate outcome of one dispatch pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReport {
    pub succeeded: usize,
    pub failed: usize,
    /// Endpoints removed because the push service reported them gone.
    pub pruned: Vec<String>,
    /// Subscriptions never attempted because the pass was cancelled.
    #[serde(default)]
    pub skipped: usize,
}
