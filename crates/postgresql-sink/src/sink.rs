//! `tokio-postgres` implementation of [`DestinationSink`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;
use sync_core::{ColumnRow, RetentionPlan, TableSyncSpec};
use tokio::sync::Mutex;
use tokio_postgres::types::ToSql;
use tokio_postgres::Client;
use tracing::{debug, info, warn};

use crate::ddl::{qualified, PostgreSQLDdl, ToDdl};
use crate::params::to_param;
use crate::statements::{purge_sql, rows_per_statement, upsert_sql};
use crate::DestinationSink;

const PK_EXISTS_SQL: &str = "SELECT 1 FROM information_schema.table_constraints \
     WHERE table_schema = $1 AND table_name = $2 AND constraint_type = 'PRIMARY KEY'";

/// Destination sink writing into one Postgres schema.
pub struct PostgresSink {
    client: Arc<Mutex<Client>>,
    schema: String,
    batch_size: usize,
}

impl PostgresSink {
    pub fn new(client: Arc<Mutex<Client>>, schema: impl Into<String>, batch_size: usize) -> Self {
        Self {
            client,
            schema: schema.into(),
            batch_size,
        }
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    async fn ensure_primary_key(&self, client: &Client, table: &TableSyncSpec) -> Result<()> {
        let Some(pk) = table.primary_key.as_deref() else {
            return Ok(());
        };

        let existing = client
            .query_opt(PK_EXISTS_SQL, &[&self.schema, &table.name])
            .await?;
        if existing.is_some() {
            return Ok(());
        }

        let sql = PostgreSQLDdl.to_add_primary_key(&self.schema, &table.name, pk);
        if let Err(e) = client.batch_execute(&sql).await {
            warn!(
                "Could not add primary key {} to {}.{}: {}",
                pk, self.schema, table.name, e
            );
        } else {
            info!("Added primary key {} to {}.{}", pk, self.schema, table.name);
        }
        Ok(())
    }
}

#[async_trait]
impl DestinationSink for PostgresSink {
    async fn ensure_table(&self, table: &TableSyncSpec) -> Result<()> {
        let client = self.client.lock().await;
        let ddl = PostgreSQLDdl;
        client
            .batch_execute(&ddl.to_create_schema(&self.schema))
            .await
            .with_context(|| format!("Failed to create schema {}", self.schema))?;
        client
            .batch_execute(&ddl.to_create_table(&self.schema, table))
            .await
            .with_context(|| format!("Failed to create table {}.{}", self.schema, table.name))?;
        self.ensure_primary_key(&client, table).await
    }

    async fn recreate_table(&self, table: &TableSyncSpec) -> Result<()> {
        {
            let client = self.client.lock().await;
            client
                .batch_execute(&PostgreSQLDdl.to_drop_table(&self.schema, &table.name))
                .await
                .with_context(|| format!("Failed to drop {}.{}", self.schema, table.name))?;
        }
        info!("Dropped {}.{} for full reload", self.schema, table.name);
        self.ensure_table(table).await
    }

    async fn truncate_table(&self, table: &str) -> Result<()> {
        let client = self.client.lock().await;
        client
            .batch_execute(&PostgreSQLDdl.to_truncate(&self.schema, table))
            .await
            .with_context(|| format!("Failed to truncate {}.{}", self.schema, table))?;
        Ok(())
    }

    async fn upsert(&self, table: &TableSyncSpec, rows: &[ColumnRow]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let columns = table.destination_columns();
        let chunk_rows = rows_per_statement(columns.len(), self.batch_size);

        let mut client = self.client.lock().await;
        let tx = client
            .transaction()
            .await
            .context("Failed to open load transaction")?;

        let mut written = 0u64;
        for chunk in rows.chunks(chunk_rows) {
            let sql = upsert_sql(
                &self.schema,
                &table.name,
                &columns,
                table.primary_key.as_deref(),
                chunk.len(),
            );
            let params: Vec<Box<dyn ToSql + Sync + Send>> =
                chunk.iter().flatten().map(to_param).collect();
            let param_refs: Vec<&(dyn ToSql + Sync)> = params
                .iter()
                .map(|p| p.as_ref() as &(dyn ToSql + Sync))
                .collect();
            written += tx
                .execute(&sql, &param_refs)
                .await
                .with_context(|| format!("Failed to upsert into {}", qualified(&self.schema, &table.name)))?;
        }

        tx.commit().await.context("Failed to commit load transaction")?;
        debug!("Upserted {} rows into {}.{}", written, self.schema, table.name);
        Ok(written)
    }

    async fn purge(&self, table: &str, plan: &RetentionPlan<'_>, boundary: NaiveDate) -> Result<u64> {
        let client = self.client.lock().await;
        let deleted = client
            .execute(&purge_sql(&self.schema, table, plan), &[&boundary])
            .await
            .with_context(|| format!("Failed to purge {}.{}", self.schema, table))?;
        Ok(deleted)
    }
}
