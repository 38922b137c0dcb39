use taskline_core::WorkerPool;

type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub fn register(command: clap::Command) -> clap::Command {
    command.subcommand(
        clap::Command::new("factorial")
            .about("computes factorials on a worker pool and prints each result")
            .arg(
                clap::Arg::new("workers")
                    .long("workers")
                    .action(clap::ArgAction::Set)
                    .value_parser(clap::value_parser!(usize)),
            )
            .arg(
                clap::Arg::new("values")
                    .long("values")
                    .num_args(1..)
                    .action(clap::ArgAction::Append)
                    .value_parser(clap::value_parser!(u64))
                    .default_values(["3", "4", "5"]),
            ),
    )
}

pub fn run(args: &clap::ArgMatches) -> std::result::Result<(), BoxedError> {
    let values: Vec<u64> = args
        .get_many::<u64>("values")
        .expect("should have values")
        .copied()
        .collect();

    let config = crate::pool_config(args)?;
    let mut pool = WorkerPool::from_config(&config)?;
    taskline_logs::info!(workers = pool.size(), values = values.len(), "submitting factorials");

    let futures = values
        .iter()
        .map(|&n| pool.submit_fallible(move || factorial(n)).map(|future| (n, future)))
        .collect::<Result<Vec<_>, _>>()?;

    for (n, future) in futures {
        match future.get() {
            Ok(value) => println!("{n}! = {value}"),
            Err(err) => println!("{n}! failed: {err}"),
        }
    }

    pool.shutdown(true);
    pool.join_all()?;
    Ok(())
}

fn factorial(n: u64) -> Result<u64, String> {
    (1..=n).try_fold(1u64, |acc, factor| {
        acc.checked_mul(factor)
            .ok_or_else(|| format!("{n}! overflows u64"))
    })
}
