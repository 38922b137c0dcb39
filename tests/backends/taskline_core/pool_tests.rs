//! End-to-end behaviour of the worker pool and its queue.

use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::Duration;

use taskline_core::{TaskError, TaskQueue, WaitStatus, WorkerPool};
use tracing_test::traced_test;

fn factorial(n: u64) -> u64 {
    (1..=n).product()
}

/// WHY: the canonical example: three factorials on a two-worker pool.
/// WHAT: results arrive as 6, 24 and 120 in submission order of the futures.
#[test]
#[ntest::timeout(10000)]
fn factorials_on_a_two_worker_pool() {
    let mut pool = WorkerPool::start(2).expect("spawn workers");

    let three = pool.submit(|| factorial(3)).unwrap();
    let four = pool.submit(|| factorial(4)).unwrap();
    let five = pool.submit(|| factorial(5)).unwrap();

    assert_eq!(three.get().unwrap(), 6);
    assert_eq!(four.get().unwrap(), 24);
    assert_eq!(five.get().unwrap(), 120);

    pool.shutdown(true);
    pool.join_all().unwrap();
}

#[test]
#[ntest::timeout(10000)]
fn one_worker_executes_in_fifo_order() {
    let mut pool = WorkerPool::start(1).unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));

    for n in 0..100 {
        let seen = Arc::clone(&seen);
        drop(pool.submit(move || seen.lock().unwrap().push(n)).unwrap());
    }

    pool.shutdown(true);
    pool.join_all().unwrap();
    assert_eq!(*seen.lock().unwrap(), (0..100).collect::<Vec<_>>());
}

/// WHY: a discarding shutdown must not run anything still queued.
/// WHAT: five queued tasks behind a busy worker all report a broken channel
/// and none of them executes.
#[test]
#[ntest::timeout(10000)]
fn discard_shutdown_breaks_five_pending_tasks() {
    let mut pool = WorkerPool::start(1).unwrap();
    let busy = Arc::new(Barrier::new(2));
    let ran = Arc::new(Mutex::new(Vec::new()));

    let blocker = {
        let busy = Arc::clone(&busy);
        pool.submit(move || {
            busy.wait();
            thread::sleep(Duration::from_millis(50));
        })
        .unwrap()
    };
    busy.wait();

    let pending: Vec<_> = (0..5)
        .map(|n| {
            let ran = Arc::clone(&ran);
            pool.submit(move || ran.lock().unwrap().push(n)).unwrap()
        })
        .collect();

    assert_eq!(pool.shutdown(false), 5);
    for future in pending {
        assert!(matches!(future.get(), Err(TaskError::BrokenChannel)));
    }

    blocker.get().unwrap();
    pool.join_all().unwrap();
    assert!(ran.lock().unwrap().is_empty());
    assert_eq!(pool.stats().executed, 1);
}

#[test]
#[ntest::timeout(10000)]
fn many_producers_one_pool() {
    let mut pool = WorkerPool::start(4).unwrap();
    let queue = pool.queue().clone();

    let producers: Vec<_> = (0..4u64)
        .map(|producer| {
            let queue = queue.clone();
            thread::spawn(move || {
                (0..250u64)
                    .map(|n| queue.submit(move || producer * 1_000 + n).unwrap())
                    .map(|future| future.get().unwrap())
                    .sum::<u64>()
            })
        })
        .collect();

    let total: u64 = producers
        .into_iter()
        .map(|producer| producer.join().unwrap())
        .sum();
    let expected: u64 = (0..4u64)
        .flat_map(|producer| (0..250u64).map(move |n| producer * 1_000 + n))
        .sum();
    assert_eq!(total, expected);

    pool.shutdown(true);
    pool.join_all().unwrap();
    assert_eq!(pool.stats().executed, 1_000);
}

#[test]
#[ntest::timeout(10000)]
fn shared_future_is_read_by_many_threads() {
    let mut pool = WorkerPool::start(2).unwrap();
    let shared = pool.submit(|| factorial(10)).unwrap().share();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let shared = shared.clone();
            thread::spawn(move || shared.get().unwrap())
        })
        .collect();
    for reader in readers {
        assert_eq!(reader.join().unwrap(), 3_628_800);
    }
    assert_eq!(shared.get().unwrap(), 3_628_800);

    pool.shutdown(true);
    pool.join_all().unwrap();
}

#[test]
#[ntest::timeout(10000)]
fn bounded_wait_on_a_slow_task() {
    let mut pool = WorkerPool::start(1).unwrap();
    let slow = pool
        .submit(|| {
            thread::sleep(Duration::from_millis(200));
            "done"
        })
        .unwrap();

    assert_eq!(slow.wait_for(Duration::from_millis(10)), WaitStatus::Timeout);
    assert_eq!(slow.wait_for(Duration::from_secs(5)), WaitStatus::Ready);
    assert_eq!(slow.get().unwrap(), "done");

    pool.shutdown(true);
    pool.join_all().unwrap();
}

#[test]
#[ntest::timeout(10000)]
fn pool_over_a_bounded_queue_applies_backpressure() {
    let queue = TaskQueue::bounded(2);
    let mut pool = WorkerPool::with_queue(queue.clone(), 2).unwrap();

    let futures: Vec<_> = (1..=50u64)
        .map(|n| queue.submit(move || n * n).unwrap())
        .collect();
    assert!(queue.len() <= 2);

    let sum: u64 = futures.into_iter().map(|f| f.get().unwrap()).sum();
    assert_eq!(sum, (1..=50u64).map(|n| n * n).sum::<u64>());

    pool.shutdown(true);
    pool.join_all().unwrap();
}

#[test]
#[traced_test]
fn failing_and_panicking_tasks_leave_the_pool_usable() {
    let mut pool = WorkerPool::start(2).unwrap();

    let failed = pool
        .submit_fallible(|| Err::<u8, _>("negative input"))
        .unwrap();
    let panicked = pool.submit(|| -> u8 { panic!("stack smashed") }).unwrap();
    let fine = pool.submit(|| 9u8).unwrap();

    let failed = failed.get().unwrap_err();
    assert_eq!(failed.to_string(), "task failed: negative input");
    assert!(panicked
        .get()
        .unwrap_err()
        .task_failure()
        .is_some_and(|failure| failure.is_panic()));
    assert_eq!(fine.get().unwrap(), 9);

    pool.shutdown(true);
    pool.join_all().unwrap();

    let stats = pool.stats();
    assert_eq!((stats.executed, stats.failed, stats.panicked), (1, 1, 1));
    assert!(logs_contain("worker pool started"));
}
