//! Core types for the phc-sync engine.
//!
//! This crate holds everything that is independent of a particular database
//! driver:
//!
//! - [`SemanticType`] - The five column types a synced table can carry
//! - [`SourceValue`] / [`ColumnValue`] - Raw source values and their coerced, typed form
//! - [`SchemaRegistry`] - Declarative per-table sync configuration
//! - [`coerce`] - Total conversion from source values to destination values
//! - [`SyncWindow`] - Date arithmetic pinned once per run
//! - [`SyncOutcome`] / [`RunSummary`] - Per-table results and the run verdict
//!
//! # Architecture
//!
//! ```text
//! sync-core (this crate)
//!    │
//!    ├─── watermark        (per-table high-water marks)
//!    ├─── mssql-source     (reads SourceValue rows from SQL Server)
//!    └─── postgresql-sink  (writes ColumnValue rows to Postgres)
//! ```

pub mod coerce;
pub mod outcome;
pub mod schema;
pub mod types;
pub mod values;
pub mod window;

pub use coerce::{coerce, parse_date, parse_dotted_date, RowCoercer};
pub use outcome::{RunSummary, SyncOutcome, TableResult, DONE_MARKER};
pub use schema::{
    ColumnOverride, ColumnSpec, CoercionOverride, ExtractionStrategy, ParentLink, Predicate,
    RetentionPlan, RowFilter, SchemaError, SchemaRegistry, TableSyncSpec,
};
pub use types::SemanticType;
pub use values::{ColumnRow, ColumnValue, SourceRow, SourceValue};
pub use window::SyncWindow;
