//! Postgres-backed watermark storage.
//!
//! Watermarks live next to the synced tables in `<schema>.sync_watermarks`:
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS phc.sync_watermarks (
//!     table_name TEXT PRIMARY KEY,
//!     watermark DATE NOT NULL,
//!     last_sync_time TIMESTAMP DEFAULT NOW()
//! )
//! ```

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_postgres::Client;
use tracing::debug;

use crate::store::{StoredWatermark, WatermarkStore};

pub const WATERMARK_TABLE: &str = "sync_watermarks";

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Watermark store sharing the destination connection with the sink.
pub struct PostgresWatermarkStore {
    client: Arc<Mutex<Client>>,
    schema: String,
    table: String,
}

impl PostgresWatermarkStore {
    pub fn new(client: Arc<Mutex<Client>>, schema: &str) -> Self {
        Self {
            client,
            schema: quote_ident(schema),
            table: watermark_table(schema),
        }
    }
}

/// Schema-qualified, quoted name of the watermark table.
pub fn watermark_table(schema: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(WATERMARK_TABLE))
}

fn create_sql(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (\
         table_name TEXT PRIMARY KEY, \
         watermark DATE NOT NULL, \
         last_sync_time TIMESTAMP DEFAULT NOW())"
    )
}

fn upsert_sql(table: &str) -> String {
    format!(
        "INSERT INTO {table} (table_name, watermark, last_sync_time) VALUES ($1, $2, NOW()) \
         ON CONFLICT (table_name) DO UPDATE SET \
         watermark = EXCLUDED.watermark, last_sync_time = NOW()"
    )
}

fn select_sql(table: &str) -> String {
    format!("SELECT watermark, last_sync_time FROM {table} WHERE table_name = $1")
}

fn recent_sql(table: &str) -> String {
    format!(
        "SELECT EXISTS (SELECT 1 FROM {table} WHERE table_name = $1 \
         AND last_sync_time > NOW() - make_interval(secs => $2::float8))"
    )
}

#[async_trait]
impl WatermarkStore for PostgresWatermarkStore {
    async fn ensure(&self) -> Result<()> {
        let client = self.client.lock().await;
        client
            .batch_execute(&format!("CREATE SCHEMA IF NOT EXISTS {}", self.schema))
            .await
            .with_context(|| format!("Failed to create schema {}", self.schema))?;
        client
            .batch_execute(&create_sql(&self.table))
            .await
            .with_context(|| format!("Failed to create watermark table {}", self.table))?;
        Ok(())
    }

    async fn read(&self, table: &str) -> Result<Option<StoredWatermark>> {
        let client = self.client.lock().await;
        let row = client
            .query_opt(&select_sql(&self.table), &[&table])
            .await
            .with_context(|| format!("Failed to read watermark for {table}"))?;

        Ok(row.map(|row| {
            let watermark: NaiveDate = row.get(0);
            let last_sync_time: Option<NaiveDateTime> = row.get(1);
            StoredWatermark {
                table_name: table.to_string(),
                watermark,
                last_sync_time,
            }
        }))
    }

    async fn record(&self, table: &str, watermark: NaiveDate) -> Result<()> {
        let client = self.client.lock().await;
        client
            .execute(&upsert_sql(&self.table), &[&table, &watermark])
            .await
            .with_context(|| format!("Failed to record watermark for {table}"))?;
        debug!("Recorded watermark {} for {}", watermark, table);
        Ok(())
    }

    async fn synced_within(&self, table: &str, window: Duration) -> Result<bool> {
        let client = self.client.lock().await;
        let seconds = window.as_secs_f64();
        let row = client
            .query_one(&recent_sql(&self.table), &[&table, &seconds])
            .await
            .with_context(|| format!("Failed to check last sync time for {table}"))?;
        Ok(row.get(0))
    }
}
