//! phc-sync library
//!
//! Incrementally syncs PHC (SQL Server) business tables into the `phc` schema
//! of a Supabase Postgres database.
//!
//! # Features
//!
//! - Declarative table registry: column mapping, row predicates, parent joins
//! - Watermark-driven incremental extraction with an overlap window
//! - Idempotent batched upserts keyed on each table's primary key
//! - Retention purge at the start of the current year, children purged
//!   through their parent
//! - Named jobs (incremental, today, full reload, annual snapshot) that report
//!   per-table outcomes and a final completion marker
//!
//! # Crates
//!
//! - `sync_core` - registry, values, coercion, run window and outcomes
//! - `watermark` - per-table watermark storage
//! - `phc_sync_mssql_source` - SQL Server reader
//! - `phc_sync_postgresql_sink` - Postgres writer
//!
//! # CLI Usage
//!
//! ```bash
//! # Yearly incremental run of every table
//! phc-sync incremental-year
//!
//! # Only today's work orders and lines, never skipping customers
//! phc-sync --skip-window 0 today-bo-bi
//!
//! # One table
//! phc-sync --overlap-days 7 table ft
//!
//! # Archive the last two closed years
//! phc-sync annual-snapshot --years 2
//! ```

pub mod config;
pub mod connect;
pub mod extract;
pub mod jobs;
pub mod load;
pub mod purge;
pub mod sync;
pub mod tables;
pub mod testing;

pub use config::{DestinationOpts, SourceOpts, SslMode, SyncOpts};
pub use jobs::{execute, run_job, Job};
pub use sync::{SyncMode, SyncSession};
pub use tables::phc_registry;
