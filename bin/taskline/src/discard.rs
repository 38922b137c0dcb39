use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use taskline_core::{PoolConfig, WorkerPool};

type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub fn register(command: clap::Command) -> clap::Command {
    command.subcommand(
        clap::Command::new("discard")
            .about("queues work behind a busy worker, then shuts down without draining")
            .arg(
                clap::Arg::new("pending")
                    .long("pending")
                    .action(clap::ArgAction::Set)
                    .value_parser(clap::value_parser!(usize))
                    .default_value("5"),
            ),
    )
}

pub fn run(args: &clap::ArgMatches) -> std::result::Result<(), BoxedError> {
    let pending = *args.get_one::<usize>("pending").expect("should have pending");

    let config = PoolConfig {
        workers: 1,
        ..crate::pool_config(args)?
    };
    let mut pool = WorkerPool::from_config(&config)?;

    let started = Arc::new(Barrier::new(2));
    let busy = {
        let started = Arc::clone(&started);
        pool.submit(move || {
            started.wait();
            thread::sleep(Duration::from_millis(100));
        })?
    };
    started.wait();

    let queued = (0..pending)
        .map(|n| pool.submit(move || n))
        .collect::<Result<Vec<_>, _>>()?;

    let discarded = pool.shutdown(false);
    taskline_logs::info!(discarded, "shut down without draining");

    for (n, future) in queued.into_iter().enumerate() {
        match future.get() {
            Ok(value) => println!("task {n}: ran with {value}"),
            Err(err) => println!("task {n}: {err}"),
        }
    }

    busy.get()?;
    pool.join_all()?;
    println!("{discarded} of {pending} queued tasks were discarded");
    Ok(())
}
