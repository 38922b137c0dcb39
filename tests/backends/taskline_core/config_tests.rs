//! Pools built from configuration files and the environment.

use std::env;
use std::io::Write;

use serial_test::serial;
use taskline_core::{ConfigError, PoolConfig, WorkerPool, NUM_WORKERS_ENV};

fn write_config(body: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(body.as_bytes()).expect("write config");
    file
}

#[test]
#[serial]
#[ntest::timeout(10000)]
fn pool_follows_the_config_file() {
    env::remove_var(NUM_WORKERS_ENV);
    let file = write_config("workers = 3\ncapacity = 4\nthread_name = \"calc\"\n");

    let config = PoolConfig::from_path(file.path()).unwrap();
    let mut pool = WorkerPool::from_config(&config).unwrap();
    assert_eq!(pool.size(), 3);
    assert_eq!(pool.queue().capacity(), Some(4));

    let name = pool
        .submit(|| std::thread::current().name().map(str::to_owned))
        .unwrap()
        .get()
        .unwrap();
    assert!(name.is_some_and(|name| name.starts_with("calc-")));

    pool.shutdown(true);
    pool.join_all().unwrap();
}

#[test]
#[serial]
#[ntest::timeout(10000)]
fn environment_overrides_the_file() {
    env::set_var(NUM_WORKERS_ENV, "2");
    let file = write_config("workers = 6\n");

    let config = PoolConfig::from_path(file.path()).unwrap();
    env::remove_var(NUM_WORKERS_ENV);
    assert_eq!(config.workers, 2);

    let mut pool = WorkerPool::from_config(&config).unwrap();
    assert_eq!(pool.size(), 2);
    pool.shutdown(true);
    pool.join_all().unwrap();
}

#[test]
#[serial]
fn invalid_values_are_rejected() {
    env::remove_var(NUM_WORKERS_ENV);
    let file = write_config("capacity = 0\n");
    let err = PoolConfig::from_path(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
    assert_eq!(err.to_string(), "invalid pool configuration: capacity must be at least 1");
}

#[test]
#[serial]
#[ntest::timeout(10000)]
fn drop_without_drain_discards() {
    env::remove_var(NUM_WORKERS_ENV);
    let config = PoolConfig::parse("workers = 1\ndrain_on_drop = false\n").unwrap();
    let pool = WorkerPool::from_config(&config).unwrap();

    let gate = std::sync::Arc::new(std::sync::Barrier::new(2));
    let blocker = {
        let gate = std::sync::Arc::clone(&gate);
        pool.submit(move || {
            gate.wait();
            std::thread::sleep(std::time::Duration::from_millis(30));
        })
        .unwrap()
    };
    gate.wait();
    let queued = pool.submit(|| 1).unwrap();

    drop(pool);
    blocker.get().unwrap();
    assert!(queued.get().unwrap_err().is_broken_channel());
}
