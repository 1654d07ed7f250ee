//! Upsert/load: stream source rows into the destination in batches.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use futures::StreamExt;
use phc_sync_mssql_source::{SourceQuery, SourceReader};
use phc_sync_postgresql_sink::DestinationSink;
use std::collections::HashMap;
use sync_core::{ColumnRow, ColumnValue, RowCoercer, SourceRow, TableSyncSpec};
use tracing::{debug, warn};

use crate::extract::DateTracker;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    /// Rows returned by the source
    pub rows_read: u64,
    /// Rows inserted or updated in the destination
    pub rows_written: u64,
    /// Newest date seen in the watermark column
    pub max_date: Option<NaiveDate>,
    /// Rows replaced by a later row with the same key in the same batch
    pub duplicates: u64,
    /// Rows dropped because their key coerced to NULL
    pub null_keys: u64,
}

/// Batch with repeated keys collapsed and NULL-keyed rows removed.
#[derive(Debug, Default)]
pub struct Deduped {
    pub rows: Vec<ColumnRow>,
    pub duplicates: u64,
    pub null_keys: u64,
}

/// Collapse rows sharing a primary key; the last occurrence wins and keeps
/// the position of the first. Without a key, rows pass through untouched.
pub fn dedup_by_key(rows: Vec<ColumnRow>, key: Option<usize>) -> Deduped {
    let Some(key) = key else {
        return Deduped {
            rows,
            ..Deduped::default()
        };
    };

    let mut out: Vec<ColumnRow> = Vec::with_capacity(rows.len());
    let mut seen: HashMap<ColumnValue, usize> = HashMap::new();
    let mut duplicates = 0;
    let mut null_keys = 0;

    for row in rows {
        let Some(value) = row.get(key) else {
            null_keys += 1;
            continue;
        };
        if value.is_null() {
            null_keys += 1;
            continue;
        }
        match seen.get(value) {
            Some(&at) => {
                out[at] = row;
                duplicates += 1;
            }
            None => {
                seen.insert(value.clone(), out.len());
                out.push(row);
            }
        }
    }

    Deduped {
        rows: out,
        duplicates,
        null_keys,
    }
}

async fn write_batch<D: DestinationSink + ?Sized>(
    sink: &D,
    coercer: &RowCoercer,
    target: &TableSyncSpec,
    batch: &[SourceRow],
    stats: &mut LoadStats,
) -> Result<()> {
    let coerced = batch.iter().map(|row| coercer.coerce_row(row)).collect();
    let deduped = dedup_by_key(coerced, target.primary_key_index());

    if deduped.duplicates > 0 {
        warn!(
            "{}: {} rows repeated a primary key in one batch, keeping the last",
            target.name.to_uppercase(),
            deduped.duplicates
        );
    }
    if deduped.null_keys > 0 {
        warn!(
            "{}: dropped {} rows with a NULL primary key",
            target.name.to_uppercase(),
            deduped.null_keys
        );
    }

    stats.duplicates += deduped.duplicates;
    stats.null_keys += deduped.null_keys;
    stats.rows_written += sink.upsert(target, &deduped.rows).await?;
    Ok(())
}

/// Read `query` from the source and upsert every batch into `target`.
///
/// `coercer` comes from the source table's spec; `target` may be a renamed
/// copy of it (the snapshot archive tables).
pub async fn copy_rows<S, D>(
    source: &mut S,
    sink: &D,
    coercer: &RowCoercer,
    target: &TableSyncSpec,
    query: &SourceQuery,
    batch_size: usize,
) -> Result<LoadStats>
where
    S: SourceReader + ?Sized,
    D: DestinationSink + ?Sized,
{
    let mut stats = LoadStats::default();
    let mut tracker = DateTracker::for_query(query);

    if target.primary_key.is_none() {
        warn!(
            "{}: no primary key defined, rows are appended and may duplicate",
            target.name.to_uppercase()
        );
    }

    let rows = source
        .read(query)
        .await
        .with_context(|| format!("Failed to query source table {}", query.table))?;
    let mut batches = rows.chunks(batch_size.max(1));

    while let Some(batch) = batches.next().await {
        let batch: Vec<SourceRow> = batch
            .into_iter()
            .collect::<Result<_>>()
            .with_context(|| format!("Failed to read rows from {}", query.table))?;
        for row in &batch {
            tracker.observe(row);
        }
        stats.rows_read += batch.len() as u64;

        write_batch(sink, coercer, target, &batch, &mut stats).await?;
        debug!(
            "{}: {} rows loaded so far",
            target.name.to_uppercase(),
            stats.rows_written
        );
    }

    stats.max_date = tracker.max();
    Ok(stats)
}
