//! In-memory source and destination for exercising the sync engine without
//! live databases.
//!
//! [`MemorySource`] evaluates a [`SourceQuery`] directly: date scope, row
//! predicates and the parent join. [`MemorySink`] keeps destination tables
//! as row vectors with primary-key upsert and the same purge semantics as
//! the Postgres statements. Both can be told to fail for a given table.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use futures::stream::{self, BoxStream, StreamExt};
use phc_sync_mssql_source::{Selection, SourceQuery, SourceReader};
use phc_sync_postgresql_sink::DestinationSink;
use std::collections::{HashMap, HashSet};
use sync_core::{ColumnRow, ColumnValue, RetentionPlan, RowFilter, SourceRow, SourceValue, TableSyncSpec};
use tokio::sync::Mutex;

/// A source row keyed by column name. Missing columns read as NULL.
pub type Record = HashMap<String, SourceValue>;

/// Build a [`Record`] from `(column, value)` pairs.
pub fn record<V: Into<SourceValue>>(pairs: impl IntoIterator<Item = (&'static str, V)>) -> Record {
    pairs
        .into_iter()
        .map(|(column, value)| (column.to_string(), value.into()))
        .collect()
}

fn field<'r>(record: &'r Record, column: &str) -> &'r SourceValue {
    record.get(column).unwrap_or(&SourceValue::Null)
}

fn passes(filter: &RowFilter, record: &Record) -> bool {
    filter.iter().all(|predicate| match predicate.column() {
        Some(column) => predicate.accepts(field(record, column)),
        None => true,
    })
}

fn same_key(a: &SourceValue, b: &SourceValue) -> bool {
    match (a.to_text(), b.to_text()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

// ============================================================================
// Source
// ============================================================================

#[derive(Debug, Default)]
pub struct MemorySource {
    tables: HashMap<String, Vec<Record>>,
    failing: HashSet<String>,
    queries: Vec<SourceQuery>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, table: &str, record: Record) -> &mut Self {
        self.tables.entry(table.to_string()).or_default().push(record);
        self
    }

    /// Mutable access to a table's records, creating the table if needed.
    pub fn records_mut(&mut self, table: &str) -> &mut Vec<Record> {
        self.tables.entry(table.to_string()).or_default()
    }

    /// Make every read of `table` fail.
    pub fn fail_on(&mut self, table: &str) {
        self.failing.insert(table.to_string());
    }

    pub fn heal(&mut self, table: &str) {
        self.failing.remove(table);
    }

    /// Queries received so far, oldest first.
    pub fn queries(&self) -> &[SourceQuery] {
        &self.queries
    }

    fn evaluate(&self, query: &SourceQuery) -> Result<Vec<SourceRow>> {
        let records = self
            .tables
            .get(&query.table)
            .with_context(|| format!("Invalid object name '{}'", query.table))?;
        let project = |record: &Record| -> SourceRow {
            query
                .columns
                .iter()
                .map(|column| field(record, column).clone())
                .collect()
        };

        let mut rows = Vec::new();
        for child in records.iter().filter(|r| passes(&query.filter, r)) {
            match &query.selection {
                Selection::Table => rows.push(project(child)),
                Selection::Direct { column } => {
                    if query.scope.contains(field(child, column).as_date()) {
                        rows.push(project(child));
                    }
                }
                Selection::ViaParent(link) => {
                    let parents = self
                        .tables
                        .get(&link.table)
                        .with_context(|| format!("Invalid object name '{}'", link.table))?;
                    let key = field(child, &link.key);
                    for parent in parents {
                        let date = field(parent, &link.date_column);
                        if same_key(key, field(parent, &link.key))
                            && passes(&link.filter, parent)
                            && query.scope.contains(date.as_date())
                        {
                            let mut row = project(child);
                            row.push(date.clone());
                            rows.push(row);
                        }
                    }
                }
            }
        }
        Ok(rows)
    }
}

#[async_trait]
impl SourceReader for MemorySource {
    async fn read<'a>(
        &'a mut self,
        query: &SourceQuery,
    ) -> Result<BoxStream<'a, Result<SourceRow>>> {
        self.queries.push(query.clone());
        if self.failing.contains(&query.table) {
            bail!("Injected read failure for {}", query.table);
        }
        let rows = self.evaluate(query)?;
        Ok(stream::iter(rows.into_iter().map(Ok)).boxed())
    }
}

// ============================================================================
// Destination
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct SinkTable {
    pub columns: Vec<String>,
    pub key: Option<usize>,
    pub rows: Vec<ColumnRow>,
}

impl SinkTable {
    fn for_spec(spec: &TableSyncSpec) -> Self {
        Self {
            columns: spec
                .destination_columns()
                .into_iter()
                .map(str::to_string)
                .collect(),
            key: spec.primary_key_index(),
            rows: Vec::new(),
        }
    }

    fn index(&self, table: &str, column: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == column)
            .with_context(|| format!("column \"{column}\" of relation \"{table}\" does not exist"))
    }
}

#[derive(Debug, Default)]
pub struct MemorySink {
    tables: Mutex<HashMap<String, SinkTable>>,
    failing: Mutex<HashSet<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write to `table` fail.
    pub async fn fail_on(&self, table: &str) {
        self.failing.lock().await.insert(table.to_string());
    }

    pub async fn has_table(&self, table: &str) -> bool {
        self.tables.lock().await.contains_key(table)
    }

    pub async fn rows(&self, table: &str) -> Vec<ColumnRow> {
        self.tables
            .lock()
            .await
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    pub async fn row_count(&self, table: &str) -> usize {
        self.tables
            .lock()
            .await
            .get(table)
            .map_or(0, |t| t.rows.len())
    }

    /// Values of one destination column, in row order.
    pub async fn column(&self, table: &str, column: &str) -> Vec<ColumnValue> {
        let tables = self.tables.lock().await;
        let Some(t) = tables.get(table) else {
            return Vec::new();
        };
        let Ok(idx) = t.index(table, column) else {
            return Vec::new();
        };
        t.rows.iter().map(|row| row[idx].clone()).collect()
    }

    /// Value of `column` in the row whose primary key equals `key`.
    pub async fn lookup(&self, table: &str, key: &ColumnValue, column: &str) -> Option<ColumnValue> {
        let tables = self.tables.lock().await;
        let t = tables.get(table)?;
        let key_idx = t.key?;
        let idx = t.index(table, column).ok()?;
        t.rows
            .iter()
            .find(|row| &row[key_idx] == key)
            .map(|row| row[idx].clone())
    }

    async fn check_failure(&self, table: &str) -> Result<()> {
        if self.failing.lock().await.contains(table) {
            bail!("Injected write failure for {table}");
        }
        Ok(())
    }
}

fn expired(value: &ColumnValue, boundary: NaiveDate) -> bool {
    matches!(value.as_date(), Some(date) if date < boundary)
}

#[async_trait]
impl DestinationSink for MemorySink {
    async fn ensure_table(&self, table: &TableSyncSpec) -> Result<()> {
        self.check_failure(&table.name).await?;
        self.tables
            .lock()
            .await
            .entry(table.name.clone())
            .or_insert_with(|| SinkTable::for_spec(table));
        Ok(())
    }

    async fn recreate_table(&self, table: &TableSyncSpec) -> Result<()> {
        self.check_failure(&table.name).await?;
        self.tables
            .lock()
            .await
            .insert(table.name.clone(), SinkTable::for_spec(table));
        Ok(())
    }

    async fn truncate_table(&self, table: &str) -> Result<()> {
        self.check_failure(table).await?;
        let mut tables = self.tables.lock().await;
        let t = tables
            .get_mut(table)
            .with_context(|| format!("relation \"{table}\" does not exist"))?;
        t.rows.clear();
        Ok(())
    }

    async fn upsert(&self, table: &TableSyncSpec, rows: &[ColumnRow]) -> Result<u64> {
        self.check_failure(&table.name).await?;
        let mut tables = self.tables.lock().await;
        let t = tables
            .get_mut(&table.name)
            .with_context(|| format!("relation \"{}\" does not exist", table.name))?;

        for row in rows {
            if row.len() != t.columns.len() {
                bail!(
                    "row has {} values, {} has {} columns",
                    row.len(),
                    table.name,
                    t.columns.len()
                );
            }
            let existing = t
                .key
                .and_then(|k| t.rows.iter().position(|r| r[k] == row[k]));
            match existing {
                Some(at) => t.rows[at] = row.clone(),
                None => t.rows.push(row.clone()),
            }
        }
        Ok(rows.len() as u64)
    }

    async fn purge(&self, table: &str, plan: &RetentionPlan<'_>, boundary: NaiveDate) -> Result<u64> {
        self.check_failure(table).await?;
        let mut tables = self.tables.lock().await;

        let expired_keys: Option<(usize, HashSet<ColumnValue>)> = match plan {
            RetentionPlan::Direct { .. } => None,
            RetentionPlan::ViaParent {
                parent_table,
                child_key,
                parent_key,
                parent_column,
            } => {
                let parent = tables
                    .get(*parent_table)
                    .with_context(|| format!("relation \"{parent_table}\" does not exist"))?;
                let key_idx = parent.index(parent_table, parent_key)?;
                let date_idx = parent.index(parent_table, parent_column)?;
                let keys = parent
                    .rows
                    .iter()
                    .filter(|row| expired(&row[date_idx], boundary))
                    .map(|row| row[key_idx].clone())
                    .collect();
                let child = tables
                    .get(table)
                    .with_context(|| format!("relation \"{table}\" does not exist"))?;
                Some((child.index(table, child_key)?, keys))
            }
        };

        let t = tables
            .get_mut(table)
            .with_context(|| format!("relation \"{table}\" does not exist"))?;
        let before = t.rows.len();
        match (plan, expired_keys) {
            (RetentionPlan::Direct { column }, _) => {
                let idx = t.index(table, column)?;
                t.rows.retain(|row| !expired(&row[idx], boundary));
            }
            (_, Some((idx, keys))) => t.rows.retain(|row| !keys.contains(&row[idx])),
            (_, None) => {}
        }
        Ok((before - t.rows.len()) as u64)
    }
}
