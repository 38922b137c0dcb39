//! Multi-lock acquisition under contention.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use taskline_sync::{lock_all, lock_both, try_lock_both_for, LockPair, SyncError, SyncLock};

/// WHY: two threads locking the same pair in opposite argument order is the
/// classic deadlock; ordered acquisition must make it impossible.
/// WHAT: 50k swaps per thread complete and the combined balance is intact.
#[test]
#[ntest::timeout(60000)]
fn opposite_argument_order_never_deadlocks() {
    const ITERATIONS: usize = 50_000;

    let left = Arc::new(SyncLock::new(500i64));
    let right = Arc::new(SyncLock::new(500i64));
    let start = Arc::new(Barrier::new(2));

    let forward = {
        let (left, right, start) = (Arc::clone(&left), Arc::clone(&right), Arc::clone(&start));
        thread::spawn(move || {
            start.wait();
            for _ in 0..ITERATIONS {
                let (mut from, mut to) = lock_both(&*left, &*right);
                *from -= 1;
                *to += 1;
            }
        })
    };
    let backward = {
        let (left, right, start) = (Arc::clone(&left), Arc::clone(&right), Arc::clone(&start));
        thread::spawn(move || {
            start.wait();
            for _ in 0..ITERATIONS {
                let (mut from, mut to) = lock_both(&*right, &*left);
                *from -= 1;
                *to += 1;
            }
        })
    };

    forward.join().expect("forward thread");
    backward.join().expect("backward thread");

    let (left, right) = lock_both(&*left, &*right);
    assert_eq!(*left, 500);
    assert_eq!(*right, 500);
}

/// WHY: `lock_all` generalises the ordering rule to any number of locks.
/// WHAT: three threads rotating the argument order of three locks finish.
#[test]
#[ntest::timeout(60000)]
fn rotated_lock_all_never_deadlocks() {
    let locks: Arc<Vec<SyncLock<u64>>> = Arc::new((0..3).map(|_| SyncLock::new(0)).collect());

    let handles: Vec<_> = (0..3)
        .map(|rotation| {
            let locks = Arc::clone(&locks);
            thread::spawn(move || {
                for _ in 0..10_000 {
                    let order: Vec<&SyncLock<u64>> =
                        (0..3).map(|i| &locks[(i + rotation) % 3]).collect();
                    for mut guard in lock_all(&order) {
                        *guard += 1;
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("rotation thread");
    }
    for lock in locks.iter() {
        assert_eq!(*lock.lock(), 30_000);
    }
}

#[test]
#[ntest::timeout(10000)]
fn timed_pair_acquisition_leaves_no_lock_behind() {
    let first = Arc::new(SyncLock::new(1));
    let second = Arc::new(SyncLock::new(2));
    let holding = Arc::new(Barrier::new(2));
    let release = Arc::new(AtomicBool::new(false));

    let holder = {
        let (second, holding, release) =
            (Arc::clone(&second), Arc::clone(&holding), Arc::clone(&release));
        thread::spawn(move || {
            let _guard = second.lock();
            holding.wait();
            while !release.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(1));
            }
        })
    };
    holding.wait();

    let attempt = try_lock_both_for(&*first, &*second, Duration::from_millis(30));
    assert!(matches!(attempt, Err(SyncError::LockTimeout)));
    assert!(!first.is_locked());
    assert!(first.try_lock().is_ok());

    release.store(true, Ordering::SeqCst);
    holder.join().expect("holder thread");

    let (a, b) = try_lock_both_for(&*first, &*second, Duration::from_millis(30))
        .expect("both free now");
    assert_eq!(*a + *b, 3);
}

#[test]
#[ntest::timeout(30000)]
fn lock_pair_halves_stay_consistent() {
    let pair = Arc::new(LockPair::new(Vec::<u32>::new(), 0usize));

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let pair = Arc::clone(&pair);
            thread::spawn(move || {
                for n in 0..1_000 {
                    pair.with(|items, count| {
                        items.push(worker * 1_000 + n);
                        *count += 1;
                        assert_eq!(items.len(), *count);
                    });
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("pair worker");
    }

    let (items, count) = Arc::try_unwrap(pair)
        .ok()
        .expect("only owner left")
        .into_inner();
    assert_eq!(count, 4_000);
    assert_eq!(items.len(), 4_000);
}
