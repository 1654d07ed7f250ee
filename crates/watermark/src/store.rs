//! Watermark storage trait and shared types.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A persisted watermark row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredWatermark {
    pub table_name: String,
    /// Latest business date seen for the table
    pub watermark: NaiveDate,
    /// When the table last completed a sync (UTC)
    pub last_sync_time: Option<NaiveDateTime>,
}

/// Trait for watermark storage backends.
///
/// Implementations:
/// - [`PostgresWatermarkStore`](crate::PostgresWatermarkStore) - `sync_watermarks` table in the destination
/// - [`MemoryWatermarkStore`](crate::MemoryWatermarkStore) - in-process map, for tests and dry runs
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    /// Create the backing storage if it does not exist. Safe to call repeatedly.
    async fn ensure(&self) -> Result<()>;

    /// Read the stored watermark for a table, if any.
    async fn read(&self, table: &str) -> Result<Option<StoredWatermark>>;

    /// Upsert the watermark for a table and stamp the sync time with now.
    async fn record(&self, table: &str, watermark: NaiveDate) -> Result<()>;

    /// True when the table completed a sync less than `window` ago.
    async fn synced_within(&self, table: &str, window: Duration) -> Result<bool>;
}
