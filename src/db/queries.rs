use chrono::Utc;
use rusqlite::{Connection, params};
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

use super::from_row::{PURCHASE_EVENT_COLS, PUSH_SUBSCRIPTION_COLS, query_all, query_one};

fn now() -> i64 {
    Utc::now().timestamp()
}

fn gen_id() -> String {
    Uuid::new_v4().to_string()
}

// ============ Purchase Events ============

/// Insert or update a purchase event in a single statement.
///
/// Conflicts on `transaction_id` overwrite the parsed columns and the raw
/// payload, reset `processed`, bump `delivery_count` and leave `received_at`
/// alone. NULL transaction ids never conflict, so those rows always insert.
///
/// Returns the row id and whether the row was newly created.
pub fn upsert_purchase_event(conn: &Connection, input: &NewPurchaseEvent) -> Result<(String, bool)> {
    let now = now();
    let (id, delivery_count): (String, i64) = conn.query_row(
        "INSERT INTO purchase_events (
            id, transaction_id, event_type, buyer_email, buyer_name, buyer_country,
            product_name, product_price, product_currency, purchase_date, raw_payload,
            processed, delivery_count, received_at, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 0, 1, ?12, ?12)
         ON CONFLICT(transaction_id) DO UPDATE SET
            event_type = excluded.event_type,
            buyer_email = excluded.buyer_email,
            buyer_name = excluded.buyer_name,
            buyer_country = excluded.buyer_country,
            product_name = excluded.product_name,
            product_price = excluded.product_price,
            product_currency = excluded.product_currency,
            purchase_date = excluded.purchase_date,
            raw_payload = excluded.raw_payload,
            processed = 0,
            delivery_count = purchase_events.delivery_count + 1,
            updated_at = excluded.updated_at
         RETURNING id, delivery_count",
        params![
            gen_id(),
            input.transaction_id,
            input.event_type.as_str(),
            input.buyer.email,
            input.buyer.name,
            input.buyer.country,
            input.product.name,
            input.product.price,
            input.product.currency,
            input.purchase_date,
            input.raw_payload,
            now,
        ],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok((id, delivery_count == 1))
}

pub fn get_purchase_event(conn: &Connection, id: &str) -> Result<Option<PurchaseEvent>> {
    query_one(
        conn,
        &format!("SELECT {} FROM purchase_events WHERE id = ?1", PURCHASE_EVENT_COLS),
        &[&id],
    )
}

pub fn get_purchase_event_by_transaction_id(
    conn: &Connection,
    transaction_id: &str,
) -> Result<Option<PurchaseEvent>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM purchase_events WHERE transaction_id = ?1",
            PURCHASE_EVENT_COLS
        ),
        &[&transaction_id],
    )
}

pub fn count_purchase_events(conn: &Connection) -> Result<i64> {
    let count = conn.query_row("SELECT COUNT(*) FROM purchase_events", [], |row| row.get(0))?;
    Ok(count)
}

pub fn count_purchase_events_by_transaction_id(
    conn: &Connection,
    transaction_id: &str,
) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM purchase_events WHERE transaction_id = ?1",
        params![transaction_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Completed purchases, newest first. Feeds the sales report.
pub fn list_recent_completed_purchases(conn: &Connection, limit: i64) -> Result<Vec<PurchaseEvent>> {
    let [complete, approved] = EventType::COMPLETED;
    query_all(
        conn,
        &format!(
            "SELECT {} FROM purchase_events
             WHERE event_type IN (?1, ?2)
             ORDER BY received_at DESC, rowid DESC
             LIMIT ?3",
            PURCHASE_EVENT_COLS
        ),
        &[&complete.as_str(), &approved.as_str(), &limit],
    )
}

/// Events waiting for downstream processing, oldest first.
pub fn list_unprocessed_events(conn: &Connection, limit: i64) -> Result<Vec<PurchaseEvent>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM purchase_events
             WHERE processed = 0
             ORDER BY received_at ASC, rowid ASC
             LIMIT ?1",
            PURCHASE_EVENT_COLS
        ),
        &[&limit],
    )
}

/// Returns false if no event has this id.
pub fn mark_event_processed(conn: &Connection, id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE purchase_events SET processed = 1 WHERE id = ?1",
        params![id],
    )?;
    Ok(affected > 0)
}

// ============ Push Subscriptions ============

/// Insert a subscription unless the endpoint is already registered.
/// Returns true if a row was created.
pub fn insert_push_subscription(
    conn: &Connection,
    endpoint: &str,
    keys: &SubscriptionKeys,
) -> Result<bool> {
    let affected = conn.execute(
        "INSERT INTO push_subscriptions (id, endpoint, p256dh, auth, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(endpoint) DO NOTHING",
        params![gen_id(), endpoint, keys.p256dh, keys.auth, now()],
    )?;
    Ok(affected > 0)
}

pub fn get_push_subscription(conn: &Connection, endpoint: &str) -> Result<Option<PushSubscription>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM push_subscriptions WHERE endpoint = ?1",
            PUSH_SUBSCRIPTION_COLS
        ),
        &[&endpoint],
    )
}

pub fn list_push_subscriptions(conn: &Connection) -> Result<Vec<PushSubscription>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM push_subscriptions ORDER BY created_at ASC",
            PUSH_SUBSCRIPTION_COLS
        ),
        &[],
    )
}

pub fn count_push_subscriptions(conn: &Connection) -> Result<i64> {
    let count = conn.query_row("SELECT COUNT(*) FROM push_subscriptions", [], |row| row.get(0))?;
    Ok(count)
}

/// Returns true if a row was deleted. Deleting a missing endpoint is not an error.
pub fn delete_push_subscription(conn: &Connection, endpoint: &str) -> Result<bool> {
    let affected = conn.execute(
        "DELETE FROM push_subscriptions WHERE endpoint = ?1",
        params![endpoint],
    )?;
    Ok(affected > 0)
}

pub fn touch_push_subscription(conn: &Connection, endpoint: &str) -> Result<()> {
    conn.execute(
        "UPDATE push_subscriptions SET last_used_at = ?1 WHERE endpoint = ?2",
        params![now(), endpoint],
    )?;
    Ok(())
}
