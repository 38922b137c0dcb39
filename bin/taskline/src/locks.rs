use std::sync::Arc;
use std::thread;

use taskline_sync::{lock_both, LockPair, SyncLock};

type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

const OPENING_BALANCE: i64 = 1_000;

pub fn register(command: clap::Command) -> clap::Command {
    command.subcommand(
        clap::Command::new("locks")
            .about("moves balance between two accounts from opposite directions without deadlocking")
            .arg(
                clap::Arg::new("iterations")
                    .long("iterations")
                    .action(clap::ArgAction::Set)
                    .value_parser(clap::value_parser!(usize))
                    .default_value("100000"),
            ),
    )
}

pub fn run(args: &clap::ArgMatches) -> std::result::Result<(), BoxedError> {
    let iterations = *args
        .get_one::<usize>("iterations")
        .expect("should have iterations");

    let checking = Arc::new(SyncLock::new(OPENING_BALANCE));
    let savings = Arc::new(SyncLock::new(OPENING_BALANCE));

    let forward = spawn_transfers(&checking, &savings, iterations)?;
    let backward = spawn_transfers(&savings, &checking, iterations)?;
    forward.join().map_err(|_| "forward transfers panicked")?;
    backward.join().map_err(|_| "backward transfers panicked")?;

    let (checking, savings) = lock_both(&*checking, &*savings);
    println!(
        "after {iterations} transfers each way: checking={} savings={} total={}",
        *checking,
        *savings,
        *checking + *savings
    );
    drop((checking, savings));

    let pair = LockPair::new(Vec::<usize>::new(), Vec::<usize>::new());
    pair.with(|outbox, inbox| {
        outbox.extend(0..iterations.min(10));
        inbox.append(outbox);
    });
    let (outbox, inbox) = pair.into_inner();
    taskline_logs::info!(outbox = outbox.len(), inbox = inbox.len(), "pair transfer done");

    Ok(())
}

fn spawn_transfers(
    from: &Arc<SyncLock<i64>>,
    to: &Arc<SyncLock<i64>>,
    iterations: usize,
) -> std::io::Result<thread::JoinHandle<()>> {
    let (from, to) = (Arc::clone(from), Arc::clone(to));
    thread::Builder::new()
        .name(String::from("transfers"))
        .spawn(move || {
            for _ in 0..iterations {
                let (mut source, mut target) = lock_both(&*from, &*to);
                *source -= 1;
                *target += 1;
            }
        })
}
