use serde::{Deserialize, Serialize};
use strum::EnumString;

/// Purchase platform event category. Unknown names are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, EnumString)]
#[serde(from = "String", into = "String")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum EventType {
    PurchaseComplete,
    PurchaseApproved,
    PurchaseRefunded,
    PurchaseChargeback,
    PurchaseCanceled,
    PurchaseProtest,
    PurchaseDelayed,
    #[strum(default)]
    Other(String),
}

impl EventType {
    /// Event types stored in the `event_type` column and matched by the
    /// completed-purchases report.
    pub const COMPLETED: [EventType; 2] = [EventType::PurchaseComplete, EventType::PurchaseApproved];

    pub fn parse(s: &str) -> Self {
        s.trim()
            .parse()
            .unwrap_or_else(|_| EventType::Other(s.trim().to_string()))
    }

    pub fn as_str(&self) -> &str {
        match self {
            EventType::PurchaseComplete => "PURCHASE_COMPLETE",
            EventType::PurchaseApproved => "PURCHASE_APPROVED",
            EventType::PurchaseRefunded => "PURCHASE_REFUNDED",
            EventType::PurchaseChargeback => "PURCHASE_CHARGEBACK",
            EventType::PurchaseCanceled => "PURCHASE_CANCELED",
            EventType::PurchaseProtest => "PURCHASE_PROTEST",
            EventType::PurchaseDelayed => "PURCHASE_DELAYED",
            EventType::Other(name) => name,
        }
    }
}

impl From<String> for EventType {
    fn from(s: String) -> Self {
        EventType::parse(&s)
    }
}

impl From<EventType> for String {
    fn from(t: EventType) -> Self {
        t.as_str().to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Buyer {
    pub email: Option<String>,
    pub name: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductInfo {
    pub name: Option<String>,
    pub price: Option<f64>,
    pub currency: Option<String>,
}

/// A stored purchase event. `received_at` is when we first stored it, not
/// the platform's purchase timestamp.
#[derive(Debug, Clone, Serialize)]
pub struct PurchaseEvent {
    pub id: String,
    pub transaction_id: Option<String>,
    pub event_type: EventType,
    pub buyer: Buyer,
    pub product: ProductInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchase_date: Option<String>,
    /// Original request body, byte for byte.
    pub raw_payload: String,
    /// False on insert and again after every redelivery.
    pub processed: bool,
    pub delivery_count: i64,
    pub received_at: i64,
    pub updated_at: i64,
}

/// Input for `EventStore::record_event`.
#[derive(Debug, Clone)]
pub struct NewPurchaseEvent {
    pub transaction_id: Option<String>,
    pub event_type: EventType,
    pub buyer: Buyer,
    pub product: ProductInfo,
    pub purchase_date: Option<String>,
    pub raw_payload: String,
}
