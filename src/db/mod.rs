mod from_row;
mod schema;
pub mod queries;

pub use schema::init_db;

use std::sync::Arc;
use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::config::Config;
use crate::error::Result;
use crate::faq::FaqIndex;
use crate::ingest::IngestionService;
use crate::models::*;
use crate::push::{Dispatcher, PushTransport};
use crate::store::{AddResult, EventStore, RecordedEvent, StoreResult, SubscriptionStore};

pub type DbPool = Pool<SqliteConnectionManager>;

/// Application state shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub events: Arc<dyn EventStore>,
    pub subscriptions: Arc<dyn SubscriptionStore>,
    pub ingestion: Arc<IngestionService>,
    pub dispatcher: Arc<Dispatcher>,
    pub faq: Arc<FaqIndex>,
    /// Base64url VAPID public key handed to browsers, if push is configured.
    pub vapid_public_key: Option<String>,
    /// Bearer token for the operator API. Operator routes are only mounted when set.
    pub admin_token: Option<String>,
    /// Base URL of the public site (e.g., https://shop.example.com)
    pub base_url: String,
    pub dev_mode: bool,
}

impl AppState {
    /// Wire every component around one store and one push transport.
    pub fn new(
        config: &Config,
        store: SqliteStore,
        transport: Arc<dyn PushTransport>,
        vapid_public_key: Option<String>,
        faq: FaqIndex,
    ) -> Self {
        let store = Arc::new(store);
        let events: Arc<dyn EventStore> = store.clone();
        let subscriptions: Arc<dyn SubscriptionStore> = store;

        Self {
            ingestion: Arc::new(IngestionService::new(&config.webhook, events.clone())),
            dispatcher: Arc::new(Dispatcher::new(subscriptions.clone(), transport, &config.push)),
            events,
            subscriptions,
            faq: Arc::new(faq),
            vapid_public_key,
            admin_token: config.admin_token.clone(),
            base_url: config.base_url.clone(),
            dev_mode: config.dev_mode,
        }
    }
}

fn manager(manager: SqliteConnectionManager) -> SqliteConnectionManager {
    manager.with_init(|conn| {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")
    })
}

pub fn create_pool(database_path: &str) -> std::result::Result<DbPool, r2d2::Error> {
    Pool::builder()
        .max_size(10)
        .build(manager(SqliteConnectionManager::file(database_path)))
}

/// Single-connection in-memory pool. Every pooled connection to `:memory:`
/// is its own database, so the pool must never grow past one.
pub fn create_memory_pool() -> std::result::Result<DbPool, r2d2::Error> {
    Pool::builder()
        .max_size(1)
        .build(SqliteConnectionManager::memory())
}

/// SQLite adapter for both storage ports.
#[derive(Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Create the schema on a pooled connection.
    pub fn init(&self) -> Result<()> {
        let conn = self.pool.get()?;
        init_db(&conn)?;
        Ok(())
    }
}

impl EventStore for SqliteStore {
    fn record_event(&self, event: &NewPurchaseEvent) -> Result<RecordedEvent> {
        let conn = self.pool.get()?;
        let (id, created) = queries::upsert_purchase_event(&conn, event)?;
        Ok(RecordedEvent {
            id,
            result: if created {
                StoreResult::Created
            } else {
                StoreResult::Updated
            },
        })
    }

    fn get_event(&self, id: &str) -> Result<Option<PurchaseEvent>> {
        let conn = self.pool.get()?;
        queries::get_purchase_event(&conn, id)
    }

    fn get_by_transaction_id(&self, transaction_id: &str) -> Result<Option<PurchaseEvent>> {
        let conn = self.pool.get()?;
        queries::get_purchase_event_by_transaction_id(&conn, transaction_id)
    }

    fn count_by_transaction_id(&self, transaction_id: &str) -> Result<i64> {
        let conn = self.pool.get()?;
        queries::count_purchase_events_by_transaction_id(&conn, transaction_id)
    }

    fn count_events(&self) -> Result<i64> {
        let conn = self.pool.get()?;
        queries::count_purchase_events(&conn)
    }

    fn recent_completed_purchases(&self, limit: i64) -> Result<Vec<PurchaseEvent>> {
        let conn = self.pool.get()?;
        queries::list_recent_completed_purchases(&conn, limit)
    }

    fn list_unprocessed(&self, limit: i64) -> Result<Vec<PurchaseEvent>> {
        let conn = self.pool.get()?;
        queries::list_unprocessed_events(&conn, limit)
    }

    fn mark_processed(&self, id: &str) -> Result<bool> {
        let conn = self.pool.get()?;
        queries::mark_event_processed(&conn, id)
    }
}

impl SubscriptionStore for SqliteStore {
    fn add(&self, endpoint: &str, keys: &SubscriptionKeys) -> Result<AddResult> {
        let conn = self.pool.get()?;
        if queries::insert_push_subscription(&conn, endpoint, keys)? {
            Ok(AddResult::Created)
        } else {
            Ok(AddResult::AlreadyExists)
        }
    }

    fn get(&self, endpoint: &str) -> Result<Option<PushSubscription>> {
        let conn = self.pool.get()?;
        queries::get_push_subscription(&conn, endpoint)
    }

    fn list_all(&self) -> Result<Vec<PushSubscription>> {
        let conn = self.pool.get()?;
        queries::list_push_subscriptions(&conn)
    }

    fn remove(&self, endpoint: &str) -> Result<()> {
        let conn = self.pool.get()?;
        queries::delete_push_subscription(&conn, endpoint)?;
        Ok(())
    }

    fn touch(&self, endpoint: &str) -> Result<()> {
        let conn = self.pool.get()?;
        queries::touch_push_subscription(&conn, endpoint)
    }

    fn count_subscriptions(&self) -> Result<i64> {
        let conn = self.pool.get()?;
        queries::count_push_subscriptions(&conn)
    }
}
