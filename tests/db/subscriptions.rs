//! Subscription store tests: endpoint uniqueness and idempotent removal.

#[path = "../common/mod.rs"]
mod common;

use common::*;

#[test]
fn test_add_twice_reports_existing() {
    let store = setup_test_store();
    let endpoint = endpoint("dup");

    assert_eq!(store.add(&endpoint, &test_keys()).unwrap(), AddResult::Created);

    let other_keys = SubscriptionKeys {
        p256dh: "BOther".to_string(),
        auth: "other".to_string(),
    };
    assert_eq!(store.add(&endpoint, &other_keys).unwrap(), AddResult::AlreadyExists);

    assert_eq!(store.count_subscriptions().unwrap(), 1);
    let stored = store.get(&endpoint).unwrap().unwrap();
    assert_eq!(stored.keys, test_keys(), "first registration's keys are kept");
    assert!(stored.last_used_at.is_none());
}

#[test]
fn test_list_all_snapshot() {
    let store = setup_test_store();
    let a = add_subscription(&store, "a");
    let b = add_subscription(&store, "b");

    let mut endpoints: Vec<_> = store
        .list_all()
        .unwrap()
        .into_iter()
        .map(|s| s.endpoint)
        .collect();
    endpoints.sort();
    assert_eq!(endpoints, vec![a, b]);
}

#[test]
fn test_remove_is_idempotent() {
    let store = setup_test_store();
    let endpoint = add_subscription(&store, "gone");

    store.remove(&endpoint).unwrap();
    assert!(store.get(&endpoint).unwrap().is_none());

    store.remove(&endpoint).unwrap();
    store.remove("https://never.registered/x").unwrap();
    assert_eq!(store.count_subscriptions().unwrap(), 0);
}

#[test]
fn test_touch_records_last_use() {
    let store = setup_test_store();
    let endpoint = add_subscription(&store, "touched");

    store.touch(&endpoint).unwrap();
    let stored = store.get(&endpoint).unwrap().unwrap();
    assert!(stored.last_used_at.is_some());

    // Unknown endpoint is a no-op
    store.touch("https://never.registered/x").unwrap();
}

#[test]
fn test_endpoint_can_resubscribe_after_removal() {
    let store = setup_test_store();
    let endpoint = add_subscription(&store, "again");
    store.remove(&endpoint).unwrap();

    assert_eq!(store.add(&endpoint, &test_keys()).unwrap(), AddResult::Created);
}
