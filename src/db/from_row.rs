//! Row mapping trait and helpers for reducing boilerplate in queries.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::models::*;

/// Trait for constructing a type from a database row.
///
/// Implementing this trait allows using the `query_one` and `query_all`
/// helper functions, reducing repetitive row mapping closures.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

/// Query for multiple results.
pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ============ SQL SELECT Constants ============

pub const PURCHASE_EVENT_COLS: &str = "id, transaction_id, event_type, buyer_email, buyer_name, buyer_country, product_name, product_price, product_currency, purchase_date, raw_payload, processed, delivery_count, received_at, updated_at";

pub const PUSH_SUBSCRIPTION_COLS: &str = "id, endpoint, p256dh, auth, created_at, last_used_at";

// ============ FromRow Implementations ============

impl FromRow for PurchaseEvent {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let event_type: String = row.get(2)?;
        Ok(PurchaseEvent {
            id: row.get(0)?,
            transaction_id: row.get(1)?,
            event_type: EventType::parse(&event_type),
            buyer: Buyer {
                email: row.get(3)?,
                name: row.get(4)?,
                country: row.get(5)?,
            },
            product: ProductInfo {
                name: row.get(6)?,
                price: row.get(7)?,
                currency: row.get(8)?,
            },
            purchase_date: row.get(9)?,
            raw_payload: row.get(10)?,
            processed: row.get::<_, i32>(11)? != 0,
            delivery_count: row.get(12)?,
            received_at: row.get(13)?,
            updated_at: row.get(14)?,
        })
    }
}

impl FromRow for PushSubscription {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(PushSubscription {
            id: row.get(0)?,
            endpoint: row.get(1)?,
            keys: SubscriptionKeys {
                p256dh: row.get(2)?,
                auth: row.get(3)?,
            },
            created_at: row.get(4)?,
            last_used_at: row.get(5)?,
        })
    }
}
