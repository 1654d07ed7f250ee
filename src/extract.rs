//! Incremental extraction planning.
//!
//! Turns a table spec, a run mode and the table's prior watermark into a
//! [`SourceQuery`], and tracks the newest business date seen while its rows
//! stream by.

use anyhow::{bail, Result};
use chrono::NaiveDate;
use phc_sync_mssql_source::{DateScope, SourceQuery};
use sync_core::{SourceValue, SyncWindow, TableSyncSpec};

use crate::sync::SyncMode;

/// Date scope of one table read.
pub fn plan_scope(
    spec: &TableSyncSpec,
    mode: SyncMode,
    window: &SyncWindow,
    prior: NaiveDate,
) -> Result<DateScope> {
    if !spec.is_incremental() {
        if let SyncMode::Snapshot { .. } = mode {
            bail!("Table {} has no date column to snapshot", spec.name);
        }
        return Ok(DateScope::Unbounded);
    }

    let scope = match mode {
        SyncMode::Incremental { overlap_days } => {
            DateScope::since(window.incremental_start(prior, overlap_days))
        }
        SyncMode::Today => DateScope::since(window.run_date()),
        SyncMode::FullReload => DateScope::since(window.retention_boundary()),
        SyncMode::Snapshot { years } => match window.snapshot_range(years) {
            Some((start, end)) => DateScope::between(start, end),
            None => bail!("Cannot snapshot {} years back from {}", years, window.run_date()),
        },
    };
    Ok(scope)
}

/// Plan the source read for `spec`.
pub fn plan_query(
    spec: &TableSyncSpec,
    mode: SyncMode,
    window: &SyncWindow,
    prior: NaiveDate,
) -> Result<SourceQuery> {
    let mut query = SourceQuery::for_table(spec, plan_scope(spec, mode, window, prior)?);
    if let SyncMode::Snapshot { .. } = mode {
        query
            .filter
            .predicates
            .extend(spec.archive_filter.iter().cloned());
    }
    Ok(query)
}

/// Running maximum of the date value that drives a table's watermark.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateTracker {
    index: Option<usize>,
    max: Option<NaiveDate>,
}

impl DateTracker {
    pub fn for_query(query: &SourceQuery) -> Self {
        Self {
            index: query.date_index(),
            max: None,
        }
    }

    pub fn observe(&mut self, row: &[SourceValue]) {
        let seen = self
            .index
            .and_then(|i| row.get(i))
            .and_then(SourceValue::as_date);
        if let Some(seen) = seen {
            self.max = Some(self.max.map_or(seen, |max| max.max(seen)));
        }
    }

    pub fn max(&self) -> Option<NaiveDate> {
        self.max
    }
}
