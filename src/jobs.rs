//! Named jobs.
//!
//! A job is a fixed list of tables plus a run mode. [`run_job`] syncs the
//! tables in order against an open session; [`execute`] also loads the
//! registry and opens the connections, turning any setup failure into an
//! aborted [`RunSummary`].

use anyhow::{Context, Result};
use phc_sync_mssql_source::SourceReader;
use phc_sync_postgresql_sink::{DestinationSink, PostgresSink};
use std::time::Duration;
use sync_core::{RunSummary, SchemaRegistry, SyncWindow};
use tracing::{error, info, warn};
use watermark::{PostgresWatermarkStore, WatermarkStore};

use crate::config::{DestinationOpts, SourceOpts, SyncOpts};
use crate::connect::{connect_destination, connect_source};
use crate::sync::{SyncMode, SyncSession};
use crate::tables::phc_registry;

/// Default years kept by the annual snapshot.
pub const SNAPSHOT_YEARS: u32 = 2;

const CLIENT_SKIP_INCREMENTAL: Duration = Duration::from_secs(24 * 3600);
const CLIENT_SKIP_TODAY: Duration = Duration::from_secs(6 * 3600);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    /// Every table since the watermark, with overlap
    IncrementalYear,
    FastBoBi,
    FastAll,
    FastClients,
    TodayBoBi,
    TodayAll,
    TodayClients,
    /// Drop and reload every table
    Full,
    /// One table, incremental
    Table(String),
    /// Archive the last closed years of the dated tables
    AnnualSnapshot { years: u32 },
}

impl Job {
    pub fn name(&self) -> String {
        match self {
            Job::IncrementalYear => "incremental-year".into(),
            Job::FastBoBi => "fast-bo-bi".into(),
            Job::FastAll => "fast-all".into(),
            Job::FastClients => "fast-clients".into(),
            Job::TodayBoBi => "today-bo-bi".into(),
            Job::TodayAll => "today-all".into(),
            Job::TodayClients => "today-clients".into(),
            Job::Full => "full".into(),
            Job::Table(table) => format!("table-{table}"),
            Job::AnnualSnapshot { .. } => "annual-snapshot".into(),
        }
    }

    /// Tables synced by the job, in order. "All" jobs follow registry order.
    pub fn tables(&self, registry: &SchemaRegistry) -> Vec<String> {
        let fixed = |names: &[&str]| names.iter().map(|n| n.to_string()).collect();
        match self {
            Job::IncrementalYear | Job::FastAll | Job::TodayAll | Job::Full => registry
                .table_names()
                .into_iter()
                .map(str::to_string)
                .collect(),
            Job::FastBoBi | Job::TodayBoBi => fixed(&["cl", "bo", "bi"]),
            Job::FastClients | Job::TodayClients => fixed(&["cl"]),
            Job::Table(table) => vec![table.clone()],
            Job::AnnualSnapshot { .. } => fixed(&["bo", "ft", "fi"]),
        }
    }

    pub fn mode(&self, overlap_days: u32) -> SyncMode {
        match self {
            Job::IncrementalYear
            | Job::FastBoBi
            | Job::FastAll
            | Job::FastClients
            | Job::Table(_) => SyncMode::Incremental { overlap_days },
            Job::TodayBoBi | Job::TodayAll | Job::TodayClients => SyncMode::Today,
            Job::Full => SyncMode::FullReload,
            Job::AnnualSnapshot { years } => SyncMode::Snapshot { years: *years },
        }
    }

    /// Recency skip applied to `skip_when_recent` tables unless overridden.
    pub fn default_skip_window(&self) -> Option<Duration> {
        match self {
            Job::IncrementalYear | Job::FastBoBi | Job::FastAll => Some(CLIENT_SKIP_INCREMENTAL),
            Job::TodayBoBi | Job::TodayAll => Some(CLIENT_SKIP_TODAY),
            _ => None,
        }
    }
}

/// Run `job` on an open session. Each table is isolated: a failure is
/// recorded and the next table still runs.
pub async fn run_job<S, D, W>(
    session: &mut SyncSession<'_, S, D, W>,
    job: &Job,
    opts: &SyncOpts,
) -> RunSummary
where
    S: SourceReader + ?Sized,
    D: DestinationSink + ?Sized,
    W: WatermarkStore + ?Sized,
{
    let window = session.window();
    let mode = job.mode(opts.overlap_days);
    let skip_window = opts.skip_window.or_else(|| job.default_skip_window());
    let mut summary = RunSummary::new(job.name(), window.run_date());

    info!(
        "Starting job {} ({:?}), retention boundary {}",
        job.name(),
        mode,
        window.retention_boundary()
    );

    for table in job.tables(session.registry()) {
        let outcome = session.sync_table(&table, mode, skip_window).await;
        summary.record(table, outcome);
    }

    let failed = summary.failed_tables();
    if failed.is_empty() {
        info!(
            "Job {} finished: {} rows processed",
            job.name(),
            summary.rows_processed()
        );
    } else {
        warn!("Job {} finished with failed tables: {}", job.name(), failed.join(", "));
    }
    summary
}

/// Built-in registry, or the YAML file given on the command line.
pub fn load_registry(opts: &SyncOpts) -> Result<SchemaRegistry> {
    match &opts.tables_file {
        Some(path) => SchemaRegistry::from_file(path)
            .with_context(|| format!("Failed to load table registry from {}", path.display())),
        None => Ok(phc_registry()?),
    }
}

async fn connect_and_run(
    job: &Job,
    source_opts: &SourceOpts,
    destination_opts: &DestinationOpts,
    opts: &SyncOpts,
    window: SyncWindow,
) -> Result<RunSummary> {
    let registry = load_registry(opts)?;
    let mut source = connect_source(source_opts, opts.connect_timeout).await?;
    let client = connect_destination(destination_opts, opts.connect_timeout).await?;

    let sink = PostgresSink::new(client.clone(), &opts.schema, opts.batch_size);
    let watermarks = PostgresWatermarkStore::new(client, &opts.schema);
    watermarks.ensure().await?;

    let summary = {
        let mut session = SyncSession::new(
            &mut source,
            &sink,
            &watermarks,
            &registry,
            window,
            opts.batch_size,
        );
        run_job(&mut session, job, opts).await
    };

    if let Err(e) = source.close().await {
        warn!("Failed to close SQL Server connection: {e:#}");
    }
    Ok(summary)
}

/// Run a job end to end against the configured databases.
pub async fn execute(
    job: &Job,
    source_opts: &SourceOpts,
    destination_opts: &DestinationOpts,
    opts: &SyncOpts,
) -> RunSummary {
    let window = SyncWindow::today();
    match connect_and_run(job, source_opts, destination_opts, opts, window).await {
        Ok(summary) => summary,
        Err(e) => {
            error!("Job {} aborted: {:#}", job.name(), e);
            RunSummary::aborted(job.name(), window.run_date(), format!("{e:#}"))
        }
    }
}
