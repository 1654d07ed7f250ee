//! Command-line interface for phc-sync
//!
//! # Usage Examples
//!
//! ```bash
//! # Connection settings come from flags, the environment or a .env file
//! export MSSQL_DIRECT_CONNECTION="Server=tcp:phc.local,1433;Database=PHC;UID=etl;PWD=..."
//! export PG_HOST=db.example.supabase.co PG_DB=postgres PG_USER=etl PG_PASSWORD=...
//!
//! # Incremental run of every table
//! phc-sync incremental-year
//!
//! # Full reload into a different schema
//! phc-sync --schema phc_staging full
//! ```
//!
//! Every run ends with one JSON summary line on stdout followed by
//! `__ETL_DONE__ success=true|false`, and exits 0 only on success.

use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use phc_sync::config::{load_env_files, DestinationOpts, SourceOpts, SyncOpts};
use phc_sync::jobs::{execute, Job, SNAPSHOT_YEARS};
use sync_core::{RunSummary, SyncWindow};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "phc-sync")]
#[command(about = "Incremental sync of PHC SQL Server tables into Supabase Postgres")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    source: SourceOpts,

    #[command(flatten)]
    destination: DestinationOpts,

    #[command(flatten)]
    sync: SyncOpts,
}

#[derive(Subcommand)]
enum Commands {
    /// Incremental sync of every table since its watermark
    IncrementalYear,
    /// Incremental sync of customers, work orders and their lines
    FastBoBi,
    /// Incremental sync of every table
    FastAll,
    /// Customers only
    FastClients,
    /// Today's customers, work orders and lines
    TodayBoBi,
    /// Today's rows of every table
    TodayAll,
    /// Customers, refreshed today
    TodayClients,
    /// Drop and reload every table
    Full,
    /// Incremental sync of a single table
    Table {
        /// Table name, e.g. ft
        name: String,
    },
    /// Archive the last closed calendar years of bo, ft and fi
    AnnualSnapshot {
        #[arg(long, default_value_t = SNAPSHOT_YEARS)]
        years: u32,
    },
}

impl From<Commands> for Job {
    fn from(command: Commands) -> Self {
        match command {
            Commands::IncrementalYear => Job::IncrementalYear,
            Commands::FastBoBi => Job::FastBoBi,
            Commands::FastAll => Job::FastAll,
            Commands::FastClients => Job::FastClients,
            Commands::TodayBoBi => Job::TodayBoBi,
            Commands::TodayAll => Job::TodayAll,
            Commands::TodayClients => Job::TodayClients,
            Commands::Full => Job::Full,
            Commands::Table { name } => Job::Table(name),
            Commands::AnnualSnapshot { years } => Job::AnnualSnapshot { years },
        }
    }
}

/// Summary for a command line that could not be parsed. Help and version
/// requests are not failures and yield `None`.
fn usage_failure(e: &clap::Error) -> Option<RunSummary> {
    match e.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => None,
        _ => Some(RunSummary::aborted(
            "phc-sync",
            SyncWindow::today().run_date(),
            format!("Invalid arguments: {}", e.to_string().trim_end()),
        )),
    }
}

fn report(summary: &RunSummary) -> i32 {
    match serde_json::to_string(summary) {
        Ok(line) => println!("{line}"),
        Err(e) => error!("Failed to serialize run summary: {e}"),
    }
    println!("{}", summary.marker());
    summary.exit_code()
}

#[tokio::main]
async fn main() {
    let env_file = load_env_files();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Some(path) = env_file {
        info!("Loaded settings from {}", path.display());
    }

    // Only fails when another provider was installed first.
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let Some(summary) = usage_failure(&e) else {
                e.exit();
            };
            let _ = e.print();
            std::process::exit(report(&summary));
        }
    };

    let job = Job::from(cli.command);
    let summary = execute(&job, &cli.source, &cli.destination, &cli.sync).await;
    std::process::exit(report(&summary));
}
