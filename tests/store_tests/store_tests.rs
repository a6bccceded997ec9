//! Store Tests
//!
//! Tests verify:
//! - Basic put/get/delete operations
//! - Not-found semantics
//! - Applying log events
//! - Concurrent access patterns

use std::sync::Arc;
use std::thread;

use kvlog::wal::Event;
use kvlog::{KvError, Store};

// =============================================================================
// Basic Operations Tests
// =============================================================================

#[test]
fn test_new_store_is_empty() {
    let store = Store::new();
    assert_eq!(store.len(), 0);
    assert!(store.is_empty());
}

#[test]
fn test_put_and_get() {
    let store = Store::new();

    store.put("key1", "value1");

    assert_eq!(store.get("key1").unwrap(), "value1");
}

#[test]
fn test_get_nonexistent_key() {
    let store = Store::new();

    assert!(matches!(store.get("nonexistent"), Err(KvError::KeyNotFound)));
}

#[test]
fn test_put_overwrites_existing() {
    let store = Store::new();

    store.put("key", "old");
    store.put("key", "new");

    assert_eq!(store.get("key").unwrap(), "new");
    assert_eq!(store.len(), 1);
}

#[test]
fn test_delete_removes_key() {
    let store = Store::new();

    store.put("key", "value");
    store.delete("key");

    assert!(matches!(store.get("key"), Err(KvError::KeyNotFound)));
    assert!(!store.contains_key("key"));
}

#[test]
fn test_delete_is_idempotent() {
    let store = Store::new();

    store.delete("never-written");
    store.put("key", "value");
    store.delete("key");
    store.delete("key");

    assert!(store.is_empty());
}

#[test]
fn test_empty_value_is_a_value() {
    let store = Store::new();

    store.put("key", "");

    assert_eq!(store.get("key").unwrap(), "");
}

// =============================================================================
// Event Application Tests
// =============================================================================

#[test]
fn test_apply_events() {
    let store = Store::new();

    store.apply(&Event::put("a", "1").with_sequence(1));
    store.apply(&Event::put("b", "2").with_sequence(2));
    store.apply(&Event::delete("a").with_sequence(3));

    assert!(store.get("a").is_err());
    assert_eq!(store.get("b").unwrap(), "2");
}

#[test]
fn test_snapshot_is_a_copy() {
    let store = Store::new();
    store.put("a", "1");

    let snapshot = store.snapshot();
    store.put("a", "2");

    assert_eq!(snapshot.get("a").map(String::as_str), Some("1"));
    assert_eq!(store.get("a").unwrap(), "2");
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_writers_distinct_keys() {
    let store = Arc::new(Store::new());

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..500 {
                    store.put(format!("t{}-k{}", t, i), format!("{}", i));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.len(), 8 * 500);
    assert_eq!(store.get("t7-k499").unwrap(), "499");
}

#[test]
fn test_concurrent_readers_and_writer() {
    let store = Arc::new(Store::new());
    store.put("shared", "0");

    let writer = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for i in 1..=1000 {
                store.put("shared", i.to_string());
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let mut last = 0u32;
                for _ in 0..1000 {
                    let value: u32 = store.get("shared").unwrap().parse().unwrap();
                    // A single writer only moves the value forward
                    assert!(value >= last);
                    last = value;
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }

    assert_eq!(store.get("shared").unwrap(), "1000");
}
