//! Tests for Log Recovery
//!
//! These tests verify:
//! - Replaying a clean log into a store
//! - Replaying an empty log
//! - Put followed by delete leaves the key absent
//! - Out-of-order and malformed records abort the replay
//! - Replay stats

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use kvlog::config::SyncStrategy;
use kvlog::wal::{replay_into, ReplayStats, TransactionLogger};
use kvlog::{KvError, Store};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_log_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("transaction.log");
    fs::write(&path, contents).unwrap();
    (temp_dir, path)
}

/// Open the log and replay it into a fresh store
fn replay(path: &PathBuf) -> (kvlog::Result<ReplayStats>, Store, TransactionLogger) {
    let store = Store::new();
    let mut logger = TransactionLogger::open(path, SyncStrategy::EveryWrite).unwrap();
    let (events, errors) = logger.read_events().unwrap();
    let result = replay_into(&store, events, errors);
    (result, store, logger)
}

// =============================================================================
// Clean Replay Tests
// =============================================================================

#[test]
fn test_replay_empty_log() {
    let (_temp, path) = setup_log_file("");

    let (result, store, logger) = replay(&path);

    assert_eq!(result.unwrap(), ReplayStats::default());
    assert!(store.is_empty());
    assert_eq!(logger.last_sequence(), 0);
}

#[test]
fn test_replay_put_then_delete() {
    let (_temp, path) = setup_log_file("1\t2\tx\t10\n2\t1\tx\t\n");

    let (result, store, _logger) = replay(&path);
    let stats = result.unwrap();

    assert!(matches!(store.get("x"), Err(KvError::KeyNotFound)));
    assert_eq!(stats.events_applied, 2);
    assert_eq!(stats.puts, 1);
    assert_eq!(stats.deletes, 1);
    assert_eq!(stats.last_sequence, 2);
}

#[test]
fn test_replay_last_writer_wins() {
    let (_temp, path) = setup_log_file("1\t2\tk\tone\n2\t2\tk\ttwo\n3\t2\tother\tx\n4\t2\tk\tthree\n");

    let (result, store, _logger) = replay(&path);
    result.unwrap();

    assert_eq!(store.get("k").unwrap(), "three");
    assert_eq!(store.get("other").unwrap(), "x");
    assert_eq!(store.len(), 2);
}

#[test]
fn test_replay_delete_of_absent_key() {
    let (_temp, path) = setup_log_file("1\t1\tghost\t\n2\t2\treal\t1\n");

    let (result, store, _logger) = replay(&path);

    assert_eq!(result.unwrap().events_applied, 2);
    assert_eq!(store.len(), 1);
}

#[test]
fn test_replay_many_records_through_small_buffer() {
    let mut contents = String::new();
    for i in 1..=500u64 {
        contents.push_str(&format!("{}\t2\tkey{}\tvalue{}\n", i, i % 37, i));
    }
    let (_temp, path) = setup_log_file(&contents);

    let store = Store::new();
    let mut logger = TransactionLogger::open(&path, SyncStrategy::EveryWrite)
        .unwrap()
        .with_write_buffer(1);
    let (events, errors) = logger.read_events().unwrap();
    let stats = replay_into(&store, events, errors).unwrap();

    assert_eq!(stats.events_applied, 500);
    assert_eq!(store.len(), 37);
    assert_eq!(store.get("key0").unwrap(), "value481");
    assert_eq!(logger.last_sequence(), 500);
}

// =============================================================================
// Failed Replay Tests
// =============================================================================

#[test]
fn test_replay_out_of_order_fails() {
    let (_temp, path) = setup_log_file("2\t2\tx\t10\n1\t2\ty\t5\n");

    let (result, store, _logger) = replay(&path);

    assert!(matches!(
        result,
        Err(KvError::OutOfOrder { line: 2, previous: 2, found: 1 })
    ));
    // The offending record is never applied
    assert!(store.get("y").is_err());
}

#[test]
fn test_replay_stops_before_records_after_error() {
    let (_temp, path) = setup_log_file("1\t2\ta\t1\n1\t2\tb\t2\n5\t2\tc\t3\n");

    let (result, store, _logger) = replay(&path);

    assert!(result.unwrap_err().is_replay_error());
    assert!(store.get("b").is_err());
    assert!(store.get("c").is_err());
}

#[test]
fn test_replay_parse_error_fails() {
    let (_temp, path) = setup_log_file("1\t2\ta\t1\n2\t0\tb\t2\n");

    let (result, _store, _logger) = replay(&path);

    assert!(matches!(result, Err(KvError::Parse { line: 2, .. })));
}

#[test]
fn test_replay_truncated_record_fails() {
    // A crash mid-append can leave a partial final line
    let (_temp, path) = setup_log_file("1\t2\ta\t1\n2\t2\tb");

    let (result, store, _logger) = replay(&path);

    assert!(matches!(result, Err(KvError::Parse { line: 2, .. })));
    assert_eq!(store.get("a").unwrap(), "1");
}

#[test]
fn test_replay_invalid_utf8_fails() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("transaction.log");
    fs::write(&path, b"1\t2\ta\t\xff\n").unwrap();

    let (result, _store, _logger) = replay(&path);

    assert!(matches!(result, Err(KvError::Parse { line: 1, .. })));
}

#[test]
fn test_writer_refuses_to_start_without_run_after_failed_replay() {
    let (_temp, path) = setup_log_file("3\t2\tx\t1\n3\t2\tx\t2\n");

    let (result, _store, logger) = replay(&path);

    assert!(result.is_err());
    assert!(matches!(logger.write_put("x", "3"), Err(KvError::NotRunning)));
}

#[test]
fn test_log_round_trip_equals_direct_application() {
    let (_temp, path) = setup_log_file("");

    // Deterministic pseudo-random operation mix
    let expected = Store::new();
    {
        let live = Arc::new(Store::new());
        let mut logger = TransactionLogger::open(&path, SyncStrategy::EveryWrite).unwrap();
        logger.run(Arc::clone(&live)).unwrap();

        let mut seed: u64 = 0x2545_F491_4F6C_DD1D;
        for i in 0..400 {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            let key = format!("k{}", seed % 23);
            if seed % 4 == 0 {
                logger.write_delete(key.clone()).unwrap();
                expected.delete(&key);
            } else {
                let value = format!("v{}\twith\ttabs {}", i, seed % 1000);
                logger.write_put(key.clone(), value.clone()).unwrap();
                expected.put(key, value);
            }
        }
        logger.close().unwrap();

        assert_eq!(live.snapshot(), expected.snapshot());
    }

    let (result, replayed, _logger) = replay(&path);
    assert_eq!(result.unwrap().events_applied, 400);
    assert_eq!(replayed.snapshot(), expected.snapshot());
}
