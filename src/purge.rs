//! Retention purge.
//!
//! Rows older than the run's retention boundary are deleted after a table's
//! incremental load. A child table without its own retention column is
//! purged through its parent, so its retained window always matches the
//! parent's. Dependent children are purged before the parent itself; once the
//! parent rows are gone the join could no longer find their children.

use anyhow::Result;
use chrono::NaiveDate;
use phc_sync_postgresql_sink::DestinationSink;
use sync_core::{RetentionPlan, SchemaRegistry, TableSyncSpec};
use tracing::info;

/// Child tables whose retention is resolved through `parent`.
pub fn dependents<'a>(registry: &'a SchemaRegistry, parent: &TableSyncSpec) -> Vec<&'a TableSyncSpec> {
    registry
        .tables()
        .filter(|child| {
            matches!(
                registry.retention_plan(child),
                Some(RetentionPlan::ViaParent { parent_table, .. }) if parent_table == parent.name
            )
        })
        .collect()
}

/// Delete rows of `table` (and of its dependent children) dated before
/// `boundary`. Returns the number of rows deleted from `table` itself.
pub async fn purge_expired<D: DestinationSink + ?Sized>(
    sink: &D,
    registry: &SchemaRegistry,
    table: &TableSyncSpec,
    boundary: NaiveDate,
) -> Result<u64> {
    for child in dependents(registry, table) {
        let Some(plan) = registry.retention_plan(child) else {
            continue;
        };
        // The child may not have been synced yet.
        sink.ensure_table(child).await?;
        let deleted = sink.purge(&child.name, &plan, boundary).await?;
        if deleted > 0 {
            info!(
                "{}: purged {} rows whose {} predates {}",
                child.name.to_uppercase(),
                deleted,
                table.name.to_uppercase(),
                boundary
            );
        }
    }

    let Some(plan) = registry.retention_plan(table) else {
        return Ok(0);
    };
    let deleted = sink.purge(&table.name, &plan, boundary).await?;
    if deleted > 0 {
        info!(
            "{}: purged {} rows older than {}",
            table.name.to_uppercase(),
            deleted,
            boundary
        );
    }
    Ok(deleted)
}
