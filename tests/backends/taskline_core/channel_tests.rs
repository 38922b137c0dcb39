//! Promise/future channels used directly across threads.

use std::thread;
use std::time::Duration;

use taskline_core::{channel, defer, spawn_async, PackagedTask, TaskError, WaitStatus};

#[derive(Debug, Clone, Copy)]
enum Outcome {
    Value,
    Error,
    Abandon,
}

/// WHY: every channel records exactly one of value, error or abandonment.
/// WHAT: 300 channels completed from writer threads each yield the outcome
/// their writer chose, and a second write is always rejected.
#[test]
#[ntest::timeout(20000)]
fn each_channel_records_exactly_one_outcome() {
    let plan: Vec<Outcome> = (0..300)
        .map(|n| match n % 3 {
            0 => Outcome::Value,
            1 => Outcome::Error,
            _ => Outcome::Abandon,
        })
        .collect();

    let mut readers = Vec::new();
    let mut writers = Vec::new();
    for (n, outcome) in plan.iter().copied().enumerate() {
        let (mut promise, future) = channel::<usize>();
        readers.push((outcome, n, future));
        writers.push(thread::spawn(move || match outcome {
            Outcome::Value => {
                promise.set_value(n).unwrap();
                assert!(matches!(promise.set_error("late"), Err(TaskError::AlreadySatisfied)));
            }
            Outcome::Error => {
                promise.set_error(format!("failed {n}")).unwrap();
                assert!(matches!(promise.set_value(n), Err(TaskError::AlreadySatisfied)));
            }
            Outcome::Abandon => drop(promise),
        }));
    }

    for (outcome, n, future) in readers {
        match (outcome, future.get()) {
            (Outcome::Value, Ok(value)) => assert_eq!(value, n),
            (Outcome::Error, Err(TaskError::TaskFailure(failure))) => {
                assert_eq!(failure.to_string(), format!("failed {n}"));
            }
            (Outcome::Abandon, Err(TaskError::BrokenChannel)) => {}
            (expected, got) => panic!("channel {n}: expected {expected:?}, got {got:?}"),
        }
    }
    for writer in writers {
        writer.join().expect("writer thread");
    }
}

#[test]
#[ntest::timeout(10000)]
fn packaged_task_runs_on_another_thread() {
    let (task, future) = PackagedTask::new(|| (1..=5u64).product::<u64>());
    let runner = thread::spawn(move || task.run());

    assert_eq!(future.get().unwrap(), 120);
    runner.join().expect("runner thread");
}

#[test]
#[ntest::timeout(10000)]
fn timeouts_do_not_consume_the_outcome() {
    let (mut promise, future) = channel::<&str>();
    for _ in 0..3 {
        assert_eq!(future.wait_for(Duration::from_millis(5)), WaitStatus::Timeout);
    }
    promise.set_value("late but fine").unwrap();
    assert_eq!(future.wait_for(Duration::from_millis(5)), WaitStatus::Ready);
    assert_eq!(future.get().unwrap(), "late but fine");
}

#[test]
#[ntest::timeout(10000)]
fn async_and_deferred_launches() {
    let eager = spawn_async(|| (1..=4u64).product::<u64>()).unwrap();
    let lazy = defer(|| (1..=3u64).product::<u64>());

    assert_eq!(lazy.get().unwrap() + eager.get().unwrap(), 30);
}
