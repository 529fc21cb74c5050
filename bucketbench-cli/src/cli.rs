use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use argh::FromArgs;
use bucketbench_service::S3Compatible;
use tracing::level_filters::LevelFilter;

use crate::config::{Config, RunSettings, Target};
use crate::observability;

/// Retrieval throughput benchmark for S3-compatible object storage.
#[derive(Debug, FromArgs)]
struct Args {
    /// path to the YAML configuration file
    #[argh(option, short = 'c')]
    pub config: Option<PathBuf>,

    /// log at DEBUG level
    #[argh(switch, short = 'v')]
    pub verbose: bool,

    #[argh(subcommand)]
    pub command: Command,
}

#[derive(Debug, FromArgs)]
#[argh(subcommand)]
enum Command {
    Run(RunCommand),
    Config(ConfigCommand),
    Version(VersionCommand),
}

/// download every object of a bucket and report the throughput
///
/// Progress is logged to stderr. The final report is printed to stdout as one line of JSON.
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "run")]
struct RunCommand {
    /// name of the remote from the configuration file
    #[argh(option)]
    remote: String,

    /// name of the bucket to download from
    #[argh(option)]
    bucket: String,

    /// limits the number of objects downloaded, a negative value means no limit
    #[argh(option)]
    objects: Option<i64>,

    /// seconds after which no new downloads are started, a negative value means no limit
    #[argh(option)]
    seconds: Option<i64>,

    /// maximum number of concurrent downloads
    #[argh(option)]
    concurrency: Option<u32>,
}

/// print the resolved settings of a run without downloading anything
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "config")]
struct ConfigCommand {
    /// name of the remote from the configuration file
    #[argh(option)]
    remote: String,

    /// name of the bucket to download from
    #[argh(option)]
    bucket: String,

    /// limits the number of objects downloaded, a negative value means no limit
    #[argh(option)]
    objects: Option<i64>,

    /// seconds after which no new downloads are started, a negative value means no limit
    #[argh(option)]
    seconds: Option<i64>,

    /// maximum number of concurrent downloads
    #[argh(option)]
    concurrency: Option<u32>,
}

/// print the bucketbench version
#[derive(Default, Debug, FromArgs)]
#[argh(subcommand, name = "version")]
struct VersionCommand {}

impl From<RunCommand> for Target {
    fn from(command: RunCommand) -> Self {
        Self {
            remote: command.remote,
            bucket: command.bucket,
            objects: command.objects,
            seconds: command.seconds,
            concurrency: command.concurrency,
        }
    }
}

impl From<ConfigCommand> for Target {
    fn from(command: ConfigCommand) -> Self {
        Self {
            remote: command.remote,
            bucket: command.bucket,
            objects: command.objects,
            seconds: command.seconds,
            concurrency: command.concurrency,
        }
    }
}

/// Loads the configuration and executes the CLI command.
pub fn execute() -> Result<()> {
    let args: Args = argh::from_env();

    let (target, dry_run) = match args.command {
        Command::Version(VersionCommand {}) => {
            println!("bucketbench {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Command::Run(command) => (Target::from(command), false),
        Command::Config(command) => (Target::from(command), true),
    };

    let mut config = Config::load(args.config.as_deref())?;
    if args.verbose {
        config.logging.level = LevelFilter::DEBUG;
    }

    observability::init_tracing(&config.logging);
    tracing::debug!(?config);

    let settings = config.resolve(&target)?;
    if dry_run {
        println!("{settings:#?}");
        return Ok(());
    }

    benchmark(settings)
}

fn benchmark(settings: RunSettings) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("bench-rt")
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let storage = S3Compatible::new(settings.storage)
            .context("failed to create the storage client")?;

        bucketbench_core::run(
            Arc::new(storage),
            settings.options,
            &settings.environment,
            std::io::stdout(),
        )
        .await
        .context("benchmark failed")?;

        Ok(())
    })
}
