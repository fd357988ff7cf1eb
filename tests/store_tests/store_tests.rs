//! Tests for Store
//!
//! These tests verify:
//! - Opening with valid and invalid configuration
//! - Callback-style get / put_or_update
//! - Snapshot scenarios across separate commits
//! - Conflicts between concurrent writers
//! - Stop behaviour (idempotent, refuses new work)

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use isokv::{Config, IsoError, Store, Value};

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_store() -> Store {
    Store::with_max_level(10).unwrap()
}

// =============================================================================
// Open Tests
// =============================================================================

#[test]
fn test_open_with_default_config() {
    let store = Store::open(Config::default()).unwrap();
    assert_eq!(store.config().max_level, 10);
    assert_eq!(store.config().skip_factor, 2);
    assert_eq!(store.version_count(), 0);
    assert!(!store.is_stopped());
}

#[test]
fn test_open_rejects_zero_max_level() {
    let result = Store::with_max_level(0);
    assert!(matches!(result, Err(IsoError::Config(_))));
}

#[test]
fn test_open_rejects_skip_factor_below_two() {
    let config = Config::builder().skip_factor(1).build();
    assert!(matches!(Store::open(config), Err(IsoError::Config(_))));
}

#[test]
fn test_open_with_queued_executor() {
    let config = Config::builder().max_level(4).apply_queue_capacity(16).build();
    let store = Store::open(config).unwrap();

    let handles: Vec<_> = (0..10)
        .map(|i| {
            store
                .put_or_update(|txn| txn.put(format!("key{}", i), format!("value{}", i)))
                .unwrap()
        })
        .collect();
    for handle in handles {
        handle.wait().unwrap();
    }
    assert_eq!(store.version_count(), 10);
}

// =============================================================================
// Callback API Tests
// =============================================================================

#[test]
fn test_get_of_non_existing_key() {
    let store = setup_store();
    let found = store.get(|txn| txn.get("non-existing")).unwrap();
    assert_eq!(found, None);
}

#[test]
fn test_put_or_update_then_get() {
    let store = setup_store();
    store
        .put_or_update(|txn| txn.put("HDD", "Hard disk"))
        .unwrap()
        .wait()
        .unwrap();

    let found = store.get(|txn| txn.get("HDD")).unwrap();
    assert_eq!(found, Some(Value::from("Hard disk")));
}

#[test]
fn test_update_is_visible_to_later_reads() {
    let store = setup_store();
    store
        .put_or_update(|txn| txn.put("HDD", "Hard disk"))
        .unwrap()
        .wait()
        .unwrap();
    store
        .put_or_update(|txn| txn.put("HDD", "Hard disk drive"))
        .unwrap()
        .wait()
        .unwrap();

    let found = store.get(|txn| txn.get("HDD")).unwrap();
    assert_eq!(found, Some(Value::from("Hard disk drive")));
    assert_eq!(store.version_count(), 2);
}

#[test]
fn test_puts_multiple_key_values_in_a_transaction() {
    let store = setup_store();
    store
        .put_or_update(|txn| {
            for count in 1..=100 {
                txn.put(format!("Key:{}", count), format!("Value:{}", count))?;
            }
            Ok(())
        })
        .unwrap()
        .wait()
        .unwrap();

    let snapshot = store.begin_read().unwrap();

    store
        .put_or_update(|txn| {
            for count in 1..=100 {
                txn.put(format!("Key:{}", count), format!("Value#{}", count))?;
            }
            Ok(())
        })
        .unwrap()
        .wait()
        .unwrap();

    for count in 1..=100 {
        let key = format!("Key:{}", count);
        assert_eq!(
            snapshot.get(&key),
            Some(Value::from(format!("Value:{}", count)))
        );
    }
    store
        .get(|txn| {
            for count in 1..=100 {
                let key = format!("Key:{}", count);
                assert_eq!(txn.get(&key), Some(Value::from(format!("Value#{}", count))));
            }
        })
        .unwrap();
}

#[test]
fn test_empty_put_or_update_fails() {
    let store = setup_store();
    let result = store.put_or_update(|_| Ok(()));
    assert!(matches!(result, Err(IsoError::EmptyBatch)));
}

#[test]
fn test_writer_error_abandons_transaction() {
    let store = setup_store();
    let result = store.put_or_update(|txn| {
        txn.put("HDD", "Hard disk")?;
        txn.put("HDD", "again")
    });
    assert!(matches!(result, Err(IsoError::DuplicateKeyInBatch(_))));
    assert_eq!(store.get(|txn| txn.get("HDD")).unwrap(), None);
}

#[test]
fn test_committed_records_are_pruned() {
    let store = setup_store();
    store
        .put_or_update(|txn| txn.put("HDD", "Hard disk"))
        .unwrap()
        .wait()
        .unwrap();

    let result = store.put_or_update(|_| Ok(()));
    assert!(matches!(result, Err(IsoError::EmptyBatch)));
    store.oracle().begin_mark().wait_for_mark(1).unwrap();

    store
        .put_or_update(|txn| txn.put("isolation", "Snapshot"))
        .unwrap()
        .wait()
        .unwrap();

    assert_eq!(store.oracle().committed_transaction_count(), 1);
}

// =============================================================================
// Snapshot Scenario Tests
// =============================================================================

#[test]
fn test_snapshot_before_and_after_update() {
    let store = setup_store();
    store
        .put_or_update(|txn| txn.put("HDD", "Hard disk"))
        .unwrap()
        .wait()
        .unwrap();

    let before = store.begin_read().unwrap();

    store
        .put_or_update(|txn| txn.put("HDD", "Hard disk drive"))
        .unwrap()
        .wait()
        .unwrap();

    let after = store.begin_read().unwrap();

    assert_eq!(before.get("HDD"), Some(Value::from("Hard disk")));
    assert_eq!(after.get("HDD"), Some(Value::from("Hard disk drive")));
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_conflicting_transactions() {
    let store = Arc::new(setup_store());
    let barrier = Arc::new(Barrier::new(2));

    let reader_store = Arc::clone(&store);
    let reader_barrier = Arc::clone(&barrier);
    let reader = thread::spawn(move || {
        reader_store.put_or_update(|txn| {
            txn.get("HDD");
            txn.put("SSD", "Solid state drive")?;
            // Both snapshots are taken; let the writer commit first
            reader_barrier.wait();
            reader_barrier.wait();
            Ok(())
        })
    });

    let writer_store = Arc::clone(&store);
    let writer_barrier = Arc::clone(&barrier);
    let writer = thread::spawn(move || -> isokv::Result<()> {
        let mut txn = writer_store.begin_write()?;
        txn.put("HDD", "Hard disk")?;
        writer_barrier.wait();
        let outcome = txn.commit().and_then(|handle| handle.wait());
        writer_barrier.wait();
        outcome
    });

    writer.join().unwrap().unwrap();
    assert!(matches!(reader.join().unwrap(), Err(IsoError::Conflict)));

    let found = store.get(|txn| (txn.get("HDD"), txn.get("SSD"))).unwrap();
    assert_eq!(found, (Some(Value::from("Hard disk")), None));
}

#[test]
fn test_concurrent_writers_on_disjoint_keys() {
    let store = Arc::new(setup_store());

    let mut handles = vec![];
    for t in 0..4 {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            for i in 0..25 {
                store
                    .put_or_update(|txn| {
                        txn.put(format!("thread{}_key{}", t, i), format!("thread{}_value{}", t, i))
                    })
                    .unwrap()
                    .wait()
                    .unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    store
        .get(|txn| {
            for t in 0..4 {
                for i in 0..25 {
                    let key = format!("thread{}_key{}", t, i);
                    assert_eq!(
                        txn.get(&key),
                        Some(Value::from(format!("thread{}_value{}", t, i)))
                    );
                }
            }
        })
        .unwrap();
    assert_eq!(store.version_count(), 100);
}

// =============================================================================
// Stop Tests
// =============================================================================

#[test]
fn test_get_from_a_stopped_store() {
    let store = setup_store();
    store.stop();

    let result = store.get(|txn| txn.get("non-existing"));
    assert!(matches!(result, Err(IsoError::StoreStopped)));
}

#[test]
fn test_put_in_a_stopped_store() {
    let store = setup_store();
    store.stop();

    let result = store.put_or_update(|txn| txn.put("isolation", "Snapshot"));
    assert!(matches!(result, Err(IsoError::StoreStopped)));
    assert!(matches!(store.begin_write(), Err(IsoError::StoreStopped)));
}

#[test]
fn test_stop_twice() {
    let store = setup_store();
    store.stop();
    store.stop();
    assert!(store.is_stopped());
}

#[test]
fn test_stop_concurrently() {
    let store = Arc::new(setup_store());

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || store.stop())
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let result = store.get(|txn| txn.get("HDD"));
    assert!(matches!(result, Err(IsoError::StoreStopped)));
}

#[test]
fn test_transactions_outliving_the_store_do_not_panic() {
    let store = setup_store();
    store
        .put_or_update(|txn| txn.put("HDD", "Hard disk"))
        .unwrap()
        .wait()
        .unwrap();

    let reader = store.begin_read().unwrap();
    let mut writer = store.begin_write().unwrap();
    writer.put("SSD", "Solid state drive").unwrap();

    store.stop();

    // Storage is still readable; handing off new commits is not
    assert_eq!(reader.get("HDD"), Some(Value::from("Hard disk")));
    assert!(matches!(writer.commit(), Err(IsoError::StoreStopped)));
    drop(reader);
}

#[test]
fn test_stop_releases_blocked_snapshot() {
    let store = Arc::new(setup_store());
    let oracle = Arc::clone(store.oracle());

    // A commit that is timestamped but never applied
    let begin = oracle.begin_timestamp().unwrap();
    oracle
        .maybe_commit_timestamp(begin, &Default::default(), &Default::default())
        .unwrap();

    let reader_store = Arc::clone(&store);
    let reader = thread::spawn(move || reader_store.begin_read().map(|txn| txn.begin_timestamp()));

    thread::sleep(Duration::from_millis(50));
    store.stop();
    assert!(matches!(reader.join().unwrap(), Err(IsoError::StoreStopped)));
}
