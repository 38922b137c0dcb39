//! The shared log file written from pool workers.

use std::fs;
use std::sync::Arc;

use taskline_core::{LogFile, WorkerPool};

#[test]
#[ntest::timeout(20000)]
fn workers_share_one_log_file() {
    let dir = tempfile::tempdir().unwrap();
    let log = Arc::new(LogFile::new(dir.path().join("shared.log")));
    let mut pool = WorkerPool::start(4).unwrap();

    let writers: Vec<_> = (0..8)
        .map(|writer| {
            let log = Arc::clone(&log);
            pool.submit_fallible(move || {
                (0..25).try_for_each(|line| log.shared_print(format!("w{writer}"), line))
            })
            .unwrap()
        })
        .collect();
    for writer in writers {
        writer.get().unwrap();
    }

    pool.shutdown(true);
    pool.join_all().unwrap();

    assert_eq!(log.lines_written(), 200);
    let content = fs::read_to_string(log.path()).unwrap();
    assert_eq!(content.lines().count(), 200);
    assert!(content
        .lines()
        .all(|line| line.starts_with("From w") && line.contains(": ")));
}

#[test]
#[ntest::timeout(10000)]
fn open_failure_surfaces_through_the_future() {
    let dir = tempfile::tempdir().unwrap();
    let log = Arc::new(LogFile::new(dir.path().join("no-such-dir").join("x.log")));
    let mut pool = WorkerPool::start(1).unwrap();

    let attempt = {
        let log = Arc::clone(&log);
        pool.submit_fallible(move || log.shared_print("w0", 1)).unwrap()
    };
    let err = attempt.get().unwrap_err();
    assert!(err.to_string().starts_with("task failed: failed to open log file"));

    pool.shutdown(true);
    pool.join_all().unwrap();
    assert_eq!(log.lines_written(), 0);
}
