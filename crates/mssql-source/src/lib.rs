//! SQL Server (PHC) source for phc-sync
//!
//! Reads table rows as [`SourceRow`]s according to a [`SourceQuery`] plan.
//! Any reader implementing [`SourceReader`] can feed the sync engine; this
//! crate ships [`MssqlSource`], backed by the `tiberius` TDS driver.

mod client;
pub mod query;
pub mod tsql;
mod value;

pub use client::{mask_connection_string, to_ado_string, MssqlSource};
pub use query::{DateScope, Selection, SourceQuery};

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use sync_core::SourceRow;

/// Trait for row sources.
///
/// Rows are positionally aligned with `query.columns`; parent-joined plans
/// append the parent date as one extra trailing value.
#[async_trait]
pub trait SourceReader: Send {
    async fn read<'a>(
        &'a mut self,
        query: &SourceQuery,
    ) -> Result<BoxStream<'a, Result<SourceRow>>>;
}
