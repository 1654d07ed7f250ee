//! Per-table sync state machine.
//!
//! Every table in a run goes through the same steps:
//!
//! 1. Skip it when it is marked `skip_when_recent` and its last sync falls
//!    inside the job's skip window.
//! 2. Make sure the destination table exists (full reloads drop it first,
//!    snapshots truncate their archive table).
//! 3. Read the prior watermark and plan the source query for the run mode.
//! 4. Stream, coerce and upsert the rows in batches.
//! 5. Incremental runs purge rows older than the retention boundary.
//! 6. Advance the watermark to the newest date seen, or refresh the sync
//!    time of full-scan tables.
//!
//! A failure at any step is reported in the table's [`SyncOutcome`] and never
//! reaches the caller, so one bad table cannot stop the rest of a job.

use anyhow::Result;
use phc_sync_mssql_source::SourceReader;
use phc_sync_postgresql_sink::DestinationSink;
use std::time::Duration;
use sync_core::{RowCoercer, SchemaRegistry, SyncOutcome, SyncWindow, TableSyncSpec};
use tracing::{error, info};
use watermark::{advance, current_or, WatermarkStore};

use crate::extract::plan_query;
use crate::load::copy_rows;
use crate::purge::purge_expired;

/// How a table is refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// From the watermark minus an overlap, then purge expired rows
    Incremental { overlap_days: u32 },
    /// Only rows dated today
    Today,
    /// Drop the table and reload everything since the retention boundary
    FullReload,
    /// Copy the last `years` closed calendar years into an archive table
    Snapshot { years: u32 },
}

impl SyncMode {
    /// Whether recently synced tables may be skipped in this mode.
    pub fn honors_skip_window(&self) -> bool {
        matches!(self, SyncMode::Incremental { .. } | SyncMode::Today)
    }
}

/// Name of the archive table holding a `years` snapshot of `table`.
pub fn archive_table_name(table: &str, years: u32) -> String {
    format!("{years}years_{table}")
}

/// Everything one run needs to sync tables.
pub struct SyncSession<'a, S: ?Sized, D: ?Sized, W: ?Sized> {
    source: &'a mut S,
    sink: &'a D,
    watermarks: &'a W,
    registry: &'a SchemaRegistry,
    window: SyncWindow,
    batch_size: usize,
}

impl<'a, S, D, W> SyncSession<'a, S, D, W>
where
    S: SourceReader + ?Sized,
    D: DestinationSink + ?Sized,
    W: WatermarkStore + ?Sized,
{
    pub fn new(
        source: &'a mut S,
        sink: &'a D,
        watermarks: &'a W,
        registry: &'a SchemaRegistry,
        window: SyncWindow,
        batch_size: usize,
    ) -> Self {
        Self {
            source,
            sink,
            watermarks,
            registry,
            window,
            batch_size,
        }
    }

    pub fn window(&self) -> SyncWindow {
        self.window
    }

    pub fn registry(&self) -> &'a SchemaRegistry {
        self.registry
    }

    /// Sync one table. Errors are folded into a failed outcome.
    pub async fn sync_table(
        &mut self,
        name: &str,
        mode: SyncMode,
        skip_window: Option<Duration>,
    ) -> SyncOutcome {
        match self.run_table(name, mode, skip_window).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("{}: sync failed: {:#}", name.to_uppercase(), e);
                let description = self
                    .registry
                    .get(name)
                    .map(|t| t.description.clone())
                    .unwrap_or_default();
                SyncOutcome::failed(description, format!("{e:#}"))
            }
        }
    }

    async fn run_table(
        &mut self,
        name: &str,
        mode: SyncMode,
        skip_window: Option<Duration>,
    ) -> Result<SyncOutcome> {
        let registry = self.registry;
        let spec = registry.table(name)?;

        if let Some(window) = skip_window {
            if spec.skip_when_recent
                && mode.honors_skip_window()
                && self.watermarks.synced_within(&spec.name, window).await?
            {
                info!(
                    "{}: synced within the last {:?}, skipping",
                    name.to_uppercase(),
                    window
                );
                return Ok(SyncOutcome::skipped(&spec.description));
            }
        }

        let coercer = RowCoercer::for_table(registry, spec);
        match mode {
            SyncMode::Snapshot { years } => self.snapshot(spec, &coercer, years).await,
            _ => self.refresh(spec, &coercer, mode).await,
        }
    }

    async fn refresh(
        &mut self,
        spec: &TableSyncSpec,
        coercer: &RowCoercer,
        mode: SyncMode,
    ) -> Result<SyncOutcome> {
        let label = spec.name.to_uppercase();

        if mode == SyncMode::FullReload {
            self.sink.recreate_table(spec).await?;
        } else {
            self.sink.ensure_table(spec).await?;
        }

        let prior = current_or(self.watermarks, &spec.name, self.window.default_watermark()).await?;
        let query = plan_query(spec, mode, &self.window, prior)?;
        let query_start = query.scope.lower_bound();
        match query_start {
            Some(start) => info!("{}: reading rows since {} (watermark {})", label, start, prior),
            None => info!("{}: reading all rows", label),
        }

        let stats = copy_rows(
            &mut *self.source,
            self.sink,
            coercer,
            spec,
            &query,
            self.batch_size,
        )
        .await?;

        if matches!(mode, SyncMode::Incremental { .. }) && spec.is_incremental() {
            purge_expired(self.sink, self.registry, spec, self.window.retention_boundary()).await?;
        }

        let next = if spec.is_incremental() {
            advance(self.watermarks, &spec.name, prior, stats.max_date).await?
        } else {
            self.watermarks.record(&spec.name, prior).await?;
            prior
        };

        info!(
            "{}: {} rows processed ({} read), watermark {}",
            label, stats.rows_written, stats.rows_read, next
        );

        let outcome = SyncOutcome::completed(&spec.description, stats.rows_written).with_watermark(next);
        Ok(match query_start {
            Some(start) => outcome.with_query_start(start),
            None => outcome,
        })
    }

    async fn snapshot(
        &mut self,
        spec: &TableSyncSpec,
        coercer: &RowCoercer,
        years: u32,
    ) -> Result<SyncOutcome> {
        let query = plan_query(
            spec,
            SyncMode::Snapshot { years },
            &self.window,
            self.window.default_watermark(),
        )?;
        let archive = TableSyncSpec {
            name: archive_table_name(&spec.name, years),
            ..spec.clone()
        };
        let label = archive.name.to_uppercase();

        self.sink.ensure_table(&archive).await?;
        self.sink.truncate_table(&archive.name).await?;
        info!("{}: archiving {:?}", label, query.scope);

        let stats = copy_rows(
            &mut *self.source,
            self.sink,
            coercer,
            &archive,
            &query,
            self.batch_size,
        )
        .await?;
        info!("{}: {} rows archived", label, stats.rows_written);

        let outcome = SyncOutcome::completed(&spec.description, stats.rows_written);
        Ok(match query.scope.lower_bound() {
            Some(start) => outcome.with_query_start(start),
            None => outcome,
        })
    }
}
