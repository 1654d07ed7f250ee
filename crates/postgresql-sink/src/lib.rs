//! Postgres destination for phc-sync.
//!
//! This crate defines the [`DestinationSink`] trait the sync engine writes
//! through, plus [`PostgresSink`], its `tokio-postgres` implementation. The
//! trait is phrased in engine terms (tables, coerced rows, retention plans) so
//! test doubles can implement it without SQL.

pub mod ddl;
mod params;
mod sink;
pub mod statements;

pub use ddl::{qualified, quote_ident, PostgreSQLDdl, ToDdl};
pub use params::to_param;
pub use sink::PostgresSink;
pub use statements::MAX_PARAMS;

use anyhow::Result;
use chrono::NaiveDate;
use sync_core::{ColumnRow, RetentionPlan, TableSyncSpec};

/// Trait for writing synced rows to the destination.
#[async_trait::async_trait]
pub trait DestinationSink: Send + Sync {
    /// Create the destination schema and table if missing and make sure the
    /// primary key exists.
    async fn ensure_table(&self, table: &TableSyncSpec) -> Result<()>;

    /// Drop the table and create it again, empty.
    async fn recreate_table(&self, table: &TableSyncSpec) -> Result<()>;

    /// Remove every row from a table.
    async fn truncate_table(&self, table: &str) -> Result<()>;

    /// Insert-or-update rows in one transaction. Rows must not repeat a
    /// primary key. Returns the number of rows written.
    async fn upsert(&self, table: &TableSyncSpec, rows: &[ColumnRow]) -> Result<u64>;

    /// Delete rows dated before `boundary`. Returns the number deleted.
    async fn purge(&self, table: &str, plan: &RetentionPlan<'_>, boundary: NaiveDate) -> Result<u64>;
}
