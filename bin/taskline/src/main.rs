mod discard;
mod factorial;
mod locks;
mod log;

use taskline_core::PoolConfig;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

fn main() -> std::result::Result<(), BoxedError> {
    let commander = discard::register(log::register(locks::register(factorial::register(
        clap::Command::new("taskline")
            .about("Drives the taskline worker pool, locks and log sink")
            .arg_required_else_help(true)
            .arg(
                clap::Arg::new("config")
                    .long("config")
                    .global(true)
                    .action(clap::ArgAction::Set)
                    .value_parser(clap::value_parser!(std::path::PathBuf))
                    .help("TOML file with pool settings"),
            )
            .arg(
                clap::Arg::new("verbose")
                    .long("verbose")
                    .short('v')
                    .global(true)
                    .action(clap::ArgAction::SetTrue)
                    .help("Emit debug and trace events"),
            ),
    ))));

    let matches = commander.get_matches();

    let level = if matches.get_flag("verbose") {
        Level::TRACE
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match matches.subcommand() {
        Some(("factorial", arguments)) => factorial::run(arguments)?,
        Some(("locks", arguments)) => locks::run(arguments)?,
        Some(("log", arguments)) => log::run(arguments)?,
        Some(("discard", arguments)) => discard::run(arguments)?,
        _ => {}
    }

    Ok(())
}

/// Pool settings from `--config` when given, otherwise the defaults; the
/// worker count is then replaced by `--workers` when the subcommand has it.
pub(crate) fn pool_config(args: &clap::ArgMatches) -> std::result::Result<PoolConfig, BoxedError> {
    let mut config = match args.get_one::<std::path::PathBuf>("config") {
        Some(path) => PoolConfig::from_path(path.clone())?,
        None => PoolConfig::default().with_env_overrides(),
    };

    if let Ok(Some(workers)) = args.try_get_one::<usize>("workers") {
        config.workers = *workers;
    }
    config.validate()?;
    Ok(config)
}
