//! Per-table watermarks for phc-sync
//!
//! A watermark is the latest business date the engine has seen for a table.
//! Incremental runs read from the watermark (minus an overlap) and advance it
//! after the table's load succeeds.
//!
//! # Architecture
//!
//! - [`WatermarkStore`] abstracts the storage backend
//! - [`PostgresWatermarkStore`] keeps watermarks in the destination database
//! - [`MemoryWatermarkStore`] keeps them in a map
//! - [`current_or`] and [`advance`] implement the read-default and
//!   monotonic-advance rules on top of any store

mod memory;
mod postgres;
pub mod store;

pub use memory::MemoryWatermarkStore;
pub use postgres::{watermark_table, PostgresWatermarkStore, WATERMARK_TABLE};
pub use store::{StoredWatermark, WatermarkStore};

use anyhow::Result;
use chrono::NaiveDate;
use tracing::info;

/// Watermark for `table`, or `default` when none has been recorded.
pub async fn current_or<S: WatermarkStore + ?Sized>(
    store: &S,
    table: &str,
    default: NaiveDate,
) -> Result<NaiveDate> {
    Ok(store
        .read(table)
        .await?
        .map(|stored| stored.watermark)
        .unwrap_or(default))
}

/// Advance a table's watermark to the newest of `prior` and `observed`.
///
/// The stored watermark never moves backwards. The sync time is refreshed
/// even when the date does not change.
pub async fn advance<S: WatermarkStore + ?Sized>(
    store: &S,
    table: &str,
    prior: NaiveDate,
    observed: Option<NaiveDate>,
) -> Result<NaiveDate> {
    let next = observed.map_or(prior, |seen| seen.max(prior));
    store.record(table, next).await?;
    if next > prior {
        info!("Watermark for {} advanced {} -> {}", table, prior, next);
    }
    Ok(next)
}
