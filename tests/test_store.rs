//! Store backends and scoping, exercised from outside the crate the way a
//! downstream user of `pocket::store` would reach for them.

use pocket::store::{BoundedStore, EvictionPolicy, ShardedStore, Store, StoreReader, StoreWriter};
use serde_json::json;
use std::time::Duration;

#[test]
fn nested_scopes_compose_and_stay_isolated() {
    let root = Store::default();
    let profile = root.scope("user").scope("profile");
    profile.set("age", json!(30)).unwrap();

    assert_eq!(root.get("user:profile:age").unwrap(), Some(json!(30)));
    assert_eq!(root.scope("user").get("profile:age").unwrap(), Some(json!(30)));
    assert_eq!(root.scope("other").get("age").unwrap(), None);
}

#[test]
fn bounded_store_caps_entry_count_under_sustained_writes() {
    let store = Store::new(BoundedStore::new(3, EvictionPolicy::Lru));
    for i in 0..50 {
        store.set(&format!("k{i}"), json!(i)).unwrap();
    }
    assert_eq!(store.keys().unwrap().len(), 3);
}

#[test]
fn bounded_store_with_ttl_expires_entries() {
    let store = Store::new(
        BoundedStore::new(10, EvictionPolicy::Ttl).with_default_ttl(Duration::from_millis(5)),
    );
    store.set("k", json!(1)).unwrap();
    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(store.get("k").unwrap(), None);
}

#[test]
fn bounded_store_rejects_a_value_over_max_bytes() {
    let store = Store::new(BoundedStore::new(10, EvictionPolicy::Lru).with_max_bytes(8));
    let result = store.set("k", json!("this value is definitely over eight bytes"));
    assert!(result.is_err());
}

#[test]
fn sharded_store_round_trips_many_keys() {
    let store = Store::new(ShardedStore::new(4));
    for i in 0..40 {
        store.set(&format!("key-{i}"), json!(i)).unwrap();
    }
    for i in 0..40 {
        assert_eq!(store.get(&format!("key-{i}")).unwrap(), Some(json!(i)));
    }
}
