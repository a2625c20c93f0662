//! Event store tests: idempotent upsert by transaction id and the read paths
//! behind the operator API.

#[path = "../common/mod.rs"]
mod common;

use common::*;
use salesbot::ingest::parse_event;

fn event(body: &str) -> NewPurchaseEvent {
    parse_event(body.as_bytes()).expect("test payload should parse")
}

#[test]
fn test_redelivery_updates_single_row() {
    let store = setup_test_store();

    let first = store
        .record_event(&event(&purchase_payload("PURCHASE_COMPLETE", "TX1", "a@b.com", 19.9)))
        .unwrap();
    assert_eq!(first.result, StoreResult::Created);

    let second = store
        .record_event(&event(&purchase_payload("PURCHASE_COMPLETE", "TX1", "a@b.com", 24.5)))
        .unwrap();
    assert_eq!(second.result, StoreResult::Updated);
    assert_eq!(second.id, first.id, "redelivery must keep the row id");

    assert_eq!(store.count_by_transaction_id("TX1").unwrap(), 1);
    let stored = store.get_by_transaction_id("TX1").unwrap().unwrap();
    assert_eq!(stored.product.price, Some(24.5), "second delivery wins");
    assert_eq!(stored.delivery_count, 2);
}

#[test]
fn test_redelivery_overwrites_payload_and_resets_processed() {
    let store = setup_test_store();

    let first_body = purchase_payload("PURCHASE_DELAYED", "TX9", "a@b.com", 10.0);
    let recorded = store.record_event(&event(&first_body)).unwrap();
    assert!(store.mark_processed(&recorded.id).unwrap());
    let before = store.get_event(&recorded.id).unwrap().unwrap();
    assert!(before.processed);

    let second_body = purchase_payload("PURCHASE_APPROVED", "TX9", "new@b.com", 10.0);
    store.record_event(&event(&second_body)).unwrap();

    let after = store.get_event(&recorded.id).unwrap().unwrap();
    assert!(!after.processed, "redelivery must flag the event for reprocessing");
    assert_eq!(after.event_type, EventType::PurchaseApproved);
    assert_eq!(after.buyer.email.as_deref(), Some("new@b.com"));
    assert_eq!(after.raw_payload, second_body);
    assert_eq!(after.received_at, before.received_at, "first-seen time is kept");
}

#[test]
fn test_events_without_transaction_id_never_merge() {
    let store = setup_test_store();
    let body = r#"{"event":"PURCHASE_COMPLETE","buyer":{"email":"a@b.com"}}"#;

    for _ in 0..3 {
        let recorded = store.record_event(&event(body)).unwrap();
        assert_eq!(recorded.result, StoreResult::Created);
    }

    assert_eq!(store.count_events().unwrap(), 3);
}

#[test]
fn test_unrelated_data_object_keeps_top_level_transaction_id() {
    let store = setup_test_store();
    let body = r#"{"event":"PURCHASE_COMPLETE","data":{"buyer":{"email":"a@b.com"}},"transaction":{"transaction_id":"TX9"}}"#;

    for _ in 0..2 {
        store.record_event(&event(body)).unwrap();
    }

    assert_eq!(store.count_by_transaction_id("TX9").unwrap(), 1);
    assert_eq!(store.count_events().unwrap(), 1);
    let stored = store.get_by_transaction_id("TX9").unwrap().unwrap();
    assert_eq!(stored.buyer.email.as_deref(), Some("a@b.com"));
}

#[test]
fn test_large_numeric_transaction_ids_do_not_collide() {
    let store = setup_test_store();
    let first = r#"{"event":"PURCHASE_COMPLETE","transaction":{"transaction_id":18446744073709551610}}"#;
    let second = r#"{"event":"PURCHASE_COMPLETE","transaction":{"transaction_id":18446744073709551615}}"#;

    assert_eq!(store.record_event(&event(first)).unwrap().result, StoreResult::Created);
    assert_eq!(store.record_event(&event(second)).unwrap().result, StoreResult::Created);

    assert_eq!(store.count_events().unwrap(), 2);
    let stored = store
        .get_by_transaction_id("18446744073709551610")
        .unwrap()
        .unwrap();
    assert_eq!(stored.raw_payload, first);
}

#[test]
fn test_get_missing_event() {
    let store = setup_test_store();
    assert!(store.get_event("missing").unwrap().is_none());
    assert!(store.get_by_transaction_id("missing").unwrap().is_none());
    assert_eq!(store.count_by_transaction_id("missing").unwrap(), 0);
    assert!(!store.mark_processed("missing").unwrap());
}

#[test]
fn test_recent_completed_purchases_filters_and_orders() {
    let store = setup_test_store();

    store
        .record_event(&event(&purchase_payload("PURCHASE_COMPLETE", "TX1", "1@b.com", 1.0)))
        .unwrap();
    store
        .record_event(&event(&purchase_payload("PURCHASE_REFUNDED", "TX2", "2@b.com", 2.0)))
        .unwrap();
    store
        .record_event(&event(&purchase_payload("PURCHASE_APPROVED", "TX3", "3@b.com", 3.0)))
        .unwrap();
    store
        .record_event(&event(&purchase_payload("SUBSCRIPTION_CANCELLATION", "TX4", "4@b.com", 4.0)))
        .unwrap();

    let purchases = store.recent_completed_purchases(10).unwrap();
    let ids: Vec<_> = purchases
        .iter()
        .map(|p| p.transaction_id.clone().unwrap())
        .collect();
    assert_eq!(ids, vec!["TX3", "TX1"], "completed only, newest first");

    assert_eq!(store.recent_completed_purchases(1).unwrap().len(), 1);
}

#[test]
fn test_unprocessed_queue() {
    let store = setup_test_store();

    let a = store
        .record_event(&event(&purchase_payload("PURCHASE_COMPLETE", "TX1", "1@b.com", 1.0)))
        .unwrap();
    let b = store
        .record_event(&event(&purchase_payload("PURCHASE_COMPLETE", "TX2", "2@b.com", 2.0)))
        .unwrap();

    assert!(store.mark_processed(&a.id).unwrap());

    let pending = store.list_unprocessed(10).unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, b.id);
}

#[test]
fn test_concurrent_redeliveries_produce_one_row() {
    use rusqlite::Connection;
    use std::sync::{Arc, Barrier};

    let num_threads = 8;
    let db_path = std::env::temp_dir().join(format!(
        "salesbot_upsert_race_{}.db",
        uuid::Uuid::new_v4()
    ));

    {
        let conn = Connection::open(&db_path).expect("Failed to create test db");
        salesbot::db::init_db(&conn).expect("Failed to init schema");
    }

    let barrier = Arc::new(Barrier::new(num_threads));
    let db_path_arc = Arc::new(db_path.clone());

    let handles: Vec<_> = (0..num_threads)
        .map(|i| {
            let barrier = Arc::clone(&barrier);
            let db_path = Arc::clone(&db_path_arc);

            std::thread::spawn(move || {
                let conn = Connection::open(db_path.as_path()).expect("thread failed to open db");
                conn.busy_timeout(std::time::Duration::from_secs(5))
                    .expect("failed to set busy timeout");

                let input = event(&purchase_payload("PURCHASE_COMPLETE", "RACE", "a@b.com", i as f64));
                barrier.wait();

                queries::upsert_purchase_event(&conn, &input)
                    .expect("upsert should not error")
                    .1
            })
        })
        .collect();

    let created: Vec<bool> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(
        created.iter().filter(|&&c| c).count(),
        1,
        "exactly one concurrent delivery should create the row"
    );

    let conn = Connection::open(&db_path).expect("failed to open db for verification");
    assert_eq!(
        queries::count_purchase_events_by_transaction_id(&conn, "RACE").unwrap(),
        1
    );
    let stored = queries::get_purchase_event_by_transaction_id(&conn, "RACE")
        .unwrap()
        .unwrap();
    assert_eq!(stored.delivery_count, num_threads as i64);

    drop(conn);
    std::fs::remove_file(&db_path).ok();
}
