use std::path::PathBuf;
use std::sync::Arc;

use taskline_core::{LogFile, WorkerPool};

type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub fn register(command: clap::Command) -> clap::Command {
    command.subcommand(
        clap::Command::new("log")
            .about("writes lines to one shared log file from every worker")
            .arg(
                clap::Arg::new("path")
                    .long("path")
                    .required(true)
                    .action(clap::ArgAction::Set)
                    .value_parser(clap::value_parser!(PathBuf)),
            )
            .arg(
                clap::Arg::new("workers")
                    .long("workers")
                    .action(clap::ArgAction::Set)
                    .value_parser(clap::value_parser!(usize)),
            )
            .arg(
                clap::Arg::new("lines")
                    .long("lines")
                    .action(clap::ArgAction::Set)
                    .value_parser(clap::value_parser!(usize))
                    .default_value("5"),
            )
            .arg_required_else_help(true),
    )
}

pub fn run(args: &clap::ArgMatches) -> std::result::Result<(), BoxedError> {
    let path = args.get_one::<PathBuf>("path").expect("should have path");
    let lines = *args.get_one::<usize>("lines").expect("should have lines");

    let config = crate::pool_config(args)?;
    let mut pool = WorkerPool::from_config(&config)?;
    let log = Arc::new(LogFile::new(path.clone()));

    let writers = (0..pool.size())
        .map(|writer| {
            let log = Arc::clone(&log);
            pool.submit_fallible(move || {
                let name = std::thread::current()
                    .name()
                    .map_or_else(|| format!("writer-{writer}"), str::to_owned);
                (0..lines).try_for_each(|line| log.shared_print(&name, line))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    for writer in writers {
        writer.get()?;
    }

    pool.shutdown(true);
    pool.join_all()?;

    println!("wrote {} lines to {}", log.lines_written(), log.path().display());
    Ok(())
}
