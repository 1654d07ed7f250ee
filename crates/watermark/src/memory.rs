//! In-memory watermark storage.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::store::{StoredWatermark, WatermarkStore};

/// Watermarks kept in a map. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryWatermarkStore {
    entries: Mutex<HashMap<String, StoredWatermark>>,
}

impl MemoryWatermarkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a watermark with an explicit sync time.
    pub async fn seed(&self, table: &str, watermark: NaiveDate, last_sync_time: NaiveDateTime) {
        self.entries.lock().await.insert(
            table.to_string(),
            StoredWatermark {
                table_name: table.to_string(),
                watermark,
                last_sync_time: Some(last_sync_time),
            },
        );
    }

    pub async fn snapshot(&self) -> HashMap<String, StoredWatermark> {
        self.entries.lock().await.clone()
    }
}

#[async_trait]
impl WatermarkStore for MemoryWatermarkStore {
    async fn ensure(&self) -> Result<()> {
        Ok(())
    }

    async fn read(&self, table: &str) -> Result<Option<StoredWatermark>> {
        Ok(self.entries.lock().await.get(table).cloned())
    }

    async fn record(&self, table: &str, watermark: NaiveDate) -> Result<()> {
        self.entries.lock().await.insert(
            table.to_string(),
            StoredWatermark {
                table_name: table.to_string(),
                watermark,
                last_sync_time: Some(Utc::now().naive_utc()),
            },
        );
        Ok(())
    }

    async fn synced_within(&self, table: &str, window: Duration) -> Result<bool> {
        let window = chrono::Duration::from_std(window)?;
        let entries = self.entries.lock().await;
        Ok(entries
            .get(table)
            .and_then(|entry| entry.last_sync_time)
            .map(|at| at > Utc::now().naive_utc() - window)
            .unwrap_or(false))
    }
}
