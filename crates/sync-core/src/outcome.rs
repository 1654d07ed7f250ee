//! Per-table results and the overall run verdict.

use chrono::NaiveDate;
use serde::Serialize;

/// Literal prefix of the completion marker printed at the end of every run.
pub const DONE_MARKER: &str = "__ETL_DONE__";

/// Result of syncing one table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncOutcome {
    pub success: bool,
    /// Table was not synced because it was refreshed recently
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub skipped: bool,
    pub rows_processed: u64,
    pub description: String,
    /// Lower bound used for extraction, if the run was date-bounded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_start: Option<NaiveDate>,
    /// Watermark recorded after the run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watermark: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyncOutcome {
    pub fn completed(description: impl Into<String>, rows_processed: u64) -> Self {
        Self {
            success: true,
            skipped: false,
            rows_processed,
            description: description.into(),
            query_start: None,
            watermark: None,
            error: None,
        }
    }

    pub fn skipped(description: impl Into<String>) -> Self {
        Self {
            skipped: true,
            ..Self::completed(description, 0)
        }
    }

    pub fn failed(description: impl Into<String>, error: impl ToString) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
            ..Self::completed(description, 0)
        }
    }

    pub fn with_query_start(mut self, start: NaiveDate) -> Self {
        self.query_start = Some(start);
        self
    }

    pub fn with_watermark(mut self, watermark: NaiveDate) -> Self {
        self.watermark = Some(watermark);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableResult {
    pub table: String,
    #[serde(flatten)]
    pub outcome: SyncOutcome,
}

/// Everything a job produced, in table order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub job: String,
    pub run_date: NaiveDate,
    pub results: Vec<TableResult>,
    /// Run-level failure that prevented table work (e.g. a connection error)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunSummary {
    pub fn new(job: impl Into<String>, run_date: NaiveDate) -> Self {
        Self {
            job: job.into(),
            run_date,
            results: Vec::new(),
            error: None,
        }
    }

    /// Summary of a run that could not start.
    pub fn aborted(job: impl Into<String>, run_date: NaiveDate, error: impl ToString) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::new(job, run_date)
        }
    }

    pub fn record(&mut self, table: impl Into<String>, outcome: SyncOutcome) {
        self.results.push(TableResult {
            table: table.into(),
            outcome,
        });
    }

    pub fn get(&self, table: &str) -> Option<&SyncOutcome> {
        self.results
            .iter()
            .find(|r| r.table == table)
            .map(|r| &r.outcome)
    }

    /// True only when the run started, attempted at least one table, and
    /// every table succeeded. Skipped tables count as successes.
    pub fn success(&self) -> bool {
        self.error.is_none()
            && !self.results.is_empty()
            && self.results.iter().all(|r| r.outcome.success)
    }

    pub fn rows_processed(&self) -> u64 {
        self.results.iter().map(|r| r.outcome.rows_processed).sum()
    }

    pub fn failed_tables(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|r| !r.outcome.success)
            .map(|r| r.table.as_str())
            .collect()
    }

    /// The completion line, e.g. `__ETL_DONE__ success=true`.
    pub fn marker(&self) -> String {
        format!("{DONE_MARKER} success={}", self.success())
    }

    pub fn exit_code(&self) -> i32 {
        if self.success() {
            0
        } else {
            1
        }
    }
}
