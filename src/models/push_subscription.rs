use serde::{Deserialize, Serialize};

/// Key material issued by the browser's push manager, base64url encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PushSubscription {
    #[serde(skip_serializing)]
    pub id: String,
    pub endpoint: String,
    pub keys: SubscriptionKeys,
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<i64>,
}
