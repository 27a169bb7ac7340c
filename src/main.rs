/*!
 * Parcel CLI
 *
 * `plan` splits a source listing into a work set, `work` runs one invocation
 * for one worker of a saved work set, and `run` does both end to end.
 */

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use parcel::{
    config::{LogLevel, ParcelConfig, Tunables},
    core::{
        plan,
        transfer::TransferExecutor,
        workflow::{advance_work_set_file, drive_all, RetryPolicy, WorkerReport},
    },
    error::{ParcelError, Result, EXIT_SUCCESS},
    logging,
    storage::{MemoryStore, ObjectStore, ObjectSummary},
    ObjectLocation,
};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "parcel")]
#[command(version, about = "Balanced bulk transfer of object-store files across workers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (defaults to the configuration file's value)
    #[arg(long = "log-level", value_enum, global = true)]
    log_level: Option<LogLevelArg>,

    /// Write JSON logs to this file instead of stdout
    #[arg(long = "log", value_name = "FILE", global = true)]
    log: Option<PathBuf>,

    /// Verbose output (debug level)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Enumerate the source and print the balanced work set
    Plan {
        /// Configuration file (TOML or JSON)
        #[arg(short, long, value_name = "FILE")]
        config: PathBuf,

        /// Number of workers
        #[arg(short, long)]
        workers: Option<usize>,

        /// Payload budget per invocation, in MB
        #[arg(long = "max-payload-mb")]
        max_payload_mb: Option<u64>,

        /// Plan from a saved JSON listing instead of querying storage
        #[arg(long, value_name = "FILE")]
        listing: Option<PathBuf>,

        /// Write the work set here instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Process the next payload of one worker and save its advanced state
    Work {
        /// Configuration file (TOML or JSON)
        #[arg(short, long, value_name = "FILE")]
        config: PathBuf,

        /// Work set produced by `plan`
        #[arg(long, value_name = "FILE")]
        workset: PathBuf,

        /// 1-based worker ordinal
        #[arg(long)]
        worker: usize,
    },

    /// Plan and drive every worker until all payloads are transferred
    Run {
        /// Configuration file (TOML or JSON)
        #[arg(short, long, value_name = "FILE")]
        config: PathBuf,

        /// Number of workers
        #[arg(short, long)]
        workers: Option<usize>,

        /// Payload budget per invocation, in MB
        #[arg(long = "max-payload-mb")]
        max_payload_mb: Option<u64>,

        /// Retries per invocation for transient storage errors
        #[arg(long = "max-retries", default_value = "3")]
        max_retries: u32,

        /// Initial retry delay in seconds
        #[arg(long = "retry-delay", default_value = "1")]
        retry_delay: u64,

        /// Print the plan without transferring anything
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevelArg> for LogLevel {
    fn from(level: LogLevelArg) -> Self {
        match level {
            LogLevelArg::Error => LogLevel::Error,
            LogLevelArg::Warn => LogLevel::Warn,
            LogLevelArg::Info => LogLevel::Info,
            LogLevelArg::Debug => LogLevel::Debug,
            LogLevelArg::Trace => LogLevel::Trace,
        }
    }
}

/// Printed after `run`
#[derive(Serialize)]
struct RunSummary {
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    workers: usize,
    files: usize,
    copied: usize,
    moved: usize,
    skipped: usize,
    deleted: usize,
    retries: usize,
    invocations: usize,
}

impl RunSummary {
    fn new(started_at: DateTime<Utc>, reports: &[WorkerReport]) -> Self {
        let sum = |f: fn(&WorkerReport) -> usize| -> usize { reports.iter().map(f).sum() };
        Self {
            started_at,
            finished_at: Utc::now(),
            workers: reports.len(),
            files: sum(WorkerReport::files),
            copied: sum(|r| r.copied),
            moved: sum(|r| r.moved),
            skipped: sum(|r| r.skipped),
            deleted: sum(|r| r.deleted),
            retries: sum(|r| r.retries),
            invocations: sum(|r| r.invocations),
        }
    }
}

fn main() {
    let code = match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    };
    std::process::exit(code);
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let config_path = match &cli.command {
        Commands::Plan { config, .. }
        | Commands::Work { config, .. }
        | Commands::Run { config, .. } => config,
    };
    let config = ParcelConfig::from_file(config_path)?;

    let log_level = cli.log_level.map(LogLevel::from).unwrap_or(config.log_level);
    let log_file = cli.log.as_deref().or(config.log_file.as_deref());
    if let Err(e) = logging::init_logging(log_level, log_file, cli.verbose) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        match cli.command {
            Commands::Plan {
                workers,
                max_payload_mb,
                listing,
                output,
                ..
            } => {
                let tunables = Tunables::resolve(workers, max_payload_mb, Some(&config))?;
                handle_plan(&config, &tunables, listing.as_deref(), output.as_deref()).await
            }
            Commands::Work {
                workset, worker, ..
            } => handle_work(&config, &workset, worker).await,
            Commands::Run {
                workers,
                max_payload_mb,
                max_retries,
                retry_delay,
                dry_run,
                ..
            } => {
                let tunables = Tunables::resolve(workers, max_payload_mb, Some(&config))?;
                let policy = RetryPolicy {
                    max_retries,
                    initial_delay: std::time::Duration::from_secs(retry_delay),
                    exponential_backoff: true,
                };
                handle_run(&config, &tunables, policy, dry_run).await
            }
        }
    })
}

async fn handle_plan(
    config: &ParcelConfig,
    tunables: &Tunables,
    listing: Option<&Path>,
    output: Option<&Path>,
) -> Result<()> {
    let store = match listing {
        Some(path) => load_listing(config, path)?,
        None => open_store(config).await?,
    };
    let plan = plan(store.as_ref(), config, tunables).await?;

    let json = plan.work_set.to_json_string()?;
    match output {
        Some(path) => {
            std::fs::write(path, json)?;
            println!(
                "Planned {} files ({} skipped) across {} workers -> {}",
                plan.partition.task_count(),
                plan.catalog.skipped.len(),
                plan.work_set.len(),
                path.display()
            );
        }
        None => println!("{}", json),
    }
    Ok(())
}

async fn handle_work(config: &ParcelConfig, workset_path: &Path, worker: usize) -> Result<()> {
    let store = open_store(config).await?;
    let executor = TransferExecutor::new(store, config.operation);
    let invocation = advance_work_set_file(&executor, workset_path, worker).await?;

    println!("{}", serde_json::to_string_pretty(&invocation.response())?);
    Ok(())
}

async fn handle_run(
    config: &ParcelConfig,
    tunables: &Tunables,
    policy: RetryPolicy,
    dry_run: bool,
) -> Result<()> {
    let started_at = Utc::now();
    let store = open_store(config).await?;
    let plan = plan(store.as_ref(), config, tunables).await?;

    if dry_run {
        println!("{}", plan.work_set.to_json_string()?);
        return Ok(());
    }

    let executor = TransferExecutor::new(store, config.operation);
    let reports = drive_all(&executor, plan.work_set, policy).await?;

    let summary = RunSummary::new(started_at, &reports);
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Seed an in-memory store from a JSON array of `{ "key", "size" }` entries
fn load_listing(config: &ParcelConfig, path: &Path) -> Result<Arc<dyn ObjectStore>> {
    let objects: Vec<ObjectSummary> = serde_json::from_str(&std::fs::read_to_string(path)?)?;
    let store = MemoryStore::new();
    for object in objects {
        store.put(ObjectLocation::new(&config.source.bucket, object.key), object.size);
    }
    Ok(Arc::new(store))
}

#[cfg(feature = "s3-native")]
async fn open_store(config: &ParcelConfig) -> Result<Arc<dyn ObjectStore>> {
    let store = parcel::storage::S3Store::new(&config.s3).await?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "s3-native"))]
async fn open_store(_config: &ParcelConfig) -> Result<Arc<dyn ObjectStore>> {
    Err(ParcelError::Config(
        "object storage access requires building with the 's3-native' feature".to_string(),
    ))
}
