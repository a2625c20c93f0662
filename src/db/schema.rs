use rusqlite::Connection;

/// Initialize the database schema. Safe to run on every startup.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- Purchase events (audit trail, never deleted)
        -- transaction_id is UNIQUE but nullable: SQLite lets any number of
        -- NULLs coexist, so events without an id are never deduplicated.
        CREATE TABLE IF NOT EXISTS purchase_events (
            id TEXT PRIMARY KEY,
            transaction_id TEXT UNIQUE,
            event_type TEXT NOT NULL,
            buyer_email TEXT,
            buyer_name TEXT,
            buyer_country TEXT,
            product_name TEXT,
            product_price REAL,
            product_currency TEXT,
            purchase_date TEXT,
            raw_payload TEXT NOT NULL,
            processed INTEGER NOT NULL DEFAULT 0,
            delivery_count INTEGER NOT NULL DEFAULT 1,
            received_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_purchase_events_type_received
            ON purchase_events(event_type, received_at);
        CREATE INDEX IF NOT EXISTS idx_purchase_events_unprocessed
            ON purchase_events(received_at) WHERE processed = 0;

        -- Web Push subscriptions, one row per endpoint
        CREATE TABLE IF NOT EXISTS push_subscriptions (
            id TEXT PRIMARY KEY,
            endpoint TEXT NOT NULL UNIQUE,
            p256dh TEXT NOT NULL,
            auth TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            last_used_at INTEGER
        );
        "#,
    )
}
