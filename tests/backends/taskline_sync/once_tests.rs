//! Once-initialization observed from many threads.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use taskline_sync::{OnceError, OnceInitializer, OncePolicy, OnceRegistry, OnceState, SyncLock};

static TABLE_READY: OnceInitializer = OnceInitializer::new();
static TABLE_LOADS: AtomicUsize = AtomicUsize::new(0);

/// WHY: every first-caller races on the same key; only one may run setup.
/// WHAT: 32 threads released together run the initializer once and all of
/// them observe the value it wrote.
#[test]
#[ntest::timeout(10000)]
fn concurrent_first_callers_share_one_initialization() {
    let registry = Arc::new(OnceRegistry::new());
    let table = Arc::new(SyncLock::new(Vec::<u32>::new()));
    let start = Arc::new(Barrier::new(32));
    let runs = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..32)
        .map(|_| {
            let (registry, table, start, runs) = (
                Arc::clone(&registry),
                Arc::clone(&table),
                Arc::clone(&start),
                Arc::clone(&runs),
            );
            thread::spawn(move || {
                start.wait();
                registry
                    .run_once("table", || {
                        runs.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(20));
                        table.lock().extend([1, 2, 3]);
                        Ok::<(), String>(())
                    })
                    .expect("initializer succeeds");
                table.with(|rows| rows.len())
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().expect("caller thread"), 3);
    }
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert!(registry.is_done("table"));
}

#[test]
#[ntest::timeout(10000)]
fn static_initializer_runs_once() {
    let handles: Vec<_> = (0..8)
        .map(|_| {
            thread::spawn(|| {
                TABLE_READY
                    .call_once(|| {
                        TABLE_LOADS.fetch_add(1, Ordering::SeqCst);
                    })
                    .expect("not poisoned");
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("caller thread");
    }
    assert_eq!(TABLE_LOADS.load(Ordering::SeqCst), 1);
    assert_eq!(TABLE_READY.state(), OnceState::Done);
}

#[test]
#[ntest::timeout(10000)]
fn retry_policy_lets_a_later_caller_succeed() {
    let once = OnceInitializer::new();

    let first = once.run(|| Err::<(), _>("disk not mounted"));
    assert!(matches!(first, Err(OnceError::Failed("disk not mounted"))));
    assert_eq!(once.state(), OnceState::NotStarted);

    once.run(|| Ok::<(), &str>(())).expect("second attempt succeeds");
    assert!(once.is_done());
}

#[test]
fn sticky_policy_reports_the_first_failure_forever() {
    let once = OnceInitializer::with_policy(OncePolicy::Sticky);
    assert!(once.run(|| Err::<(), _>("bad credentials")).is_err());

    for _ in 0..3 {
        match once.run(|| Ok::<(), &str>(())) {
            Err(OnceError::Poisoned(reason)) => assert_eq!(reason, "bad credentials"),
            other => panic!("expected poisoned, got {other:?}"),
        }
    }
    assert_eq!(once.state(), OnceState::Failed);
}
