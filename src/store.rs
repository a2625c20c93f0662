//! Storage ports for purchase events and push subscriptions.
//!
//! Callers only ever hold `Arc<dyn EventStore>` / `Arc<dyn SubscriptionStore>`.
//! Each backing engine gets one adapter (see [`crate::db::SqliteStore`]), and
//! every coordination guarantee (idempotent upsert, unique endpoint) lives in
//! that adapter's native atomic primitives, never in application locks.

use serde::Serialize;

use crate::error::Result;
use crate::models::{NewPurchaseEvent, PurchaseEvent, PushSubscription, SubscriptionKeys};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreResult {
    Created,
    /// An event with the same transaction id existed and was overwritten.
    Updated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    pub id: String,
    pub result: StoreResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AddResult {
    Created,
    AlreadyExists,
}

pub trait EventStore: Send + Sync {
    /// Idempotent upsert keyed by transaction id.
    ///
    /// The existence check and the write are one atomic operation, so
    /// concurrent redeliveries of the same id cannot produce two rows.
    /// Events without a transaction id always insert a new row.
    fn record_event(&self, event: &NewPurchaseEvent) -> Result<RecordedEvent>;

    fn get_event(&self, id: &str) -> Result<Option<PurchaseEvent>>;

    fn get_by_transaction_id(&self, transaction_id: &str) -> Result<Option<PurchaseEvent>>;

    fn count_by_transaction_id(&self, transaction_id: &str) -> Result<i64>;

    fn count_events(&self) -> Result<i64>;

    /// Completed purchases, newest first.
    fn recent_completed_purchases(&self, limit: i64) -> Result<Vec<PurchaseEvent>>;

    /// Events flagged for (re)processing, oldest first.
    fn list_unprocessed(&self, limit: i64) -> Result<Vec<PurchaseEvent>>;

    /// Returns false if the event does not exist.
    fn mark_processed(&self, id: &str) -> Result<bool>;
}

pub trait SubscriptionStore: Send + Sync {
    /// Idempotent on `endpoint`: a duplicate is reported, not an error.
    fn add(&self, endpoint: &str, keys: &SubscriptionKeys) -> Result<AddResult>;

    fn get(&self, endpoint: &str) -> Result<Option<PushSubscription>>;

    /// Snapshot of all subscriptions. Callers must not rely on ordering.
    fn list_all(&self) -> Result<Vec<PushSubscription>>;

    /// Idempotent: removing an unknown endpoint succeeds.
    fn remove(&self, endpoint: &str) -> Result<()>;

    /// Record a successful delivery.
    fn touch(&self, endpoint: &str) -> Result<()>;

    fn count_subscriptions(&self) -> Result<i64>;
}
