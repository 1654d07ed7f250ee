//! Date arithmetic for a single run.
//!
//! The run date is captured once when the run starts so every table in the
//! run agrees on the retention boundary and the snapshot range, even when the
//! run crosses midnight.

use chrono::{Datelike, Days, Months, NaiveDate, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncWindow {
    run_date: NaiveDate,
    retention_boundary: NaiveDate,
}

impl SyncWindow {
    /// Window for a run started on `run_date`. The retention boundary is
    /// January 1 of that year.
    pub fn starting(run_date: NaiveDate) -> Self {
        let retention_boundary = run_date - Days::new(u64::from(run_date.ordinal0()));
        Self {
            run_date,
            retention_boundary,
        }
    }

    /// Window pinned to today's UTC date.
    pub fn today() -> Self {
        Self::starting(Utc::now().date_naive())
    }

    pub fn run_date(&self) -> NaiveDate {
        self.run_date
    }

    pub fn retention_boundary(&self) -> NaiveDate {
        self.retention_boundary
    }

    /// Default watermark for a table that has never been synced.
    pub fn default_watermark(&self) -> NaiveDate {
        self.retention_boundary
    }

    /// Lower bound of an incremental extraction: the watermark minus the
    /// overlap, never earlier than the retention boundary.
    pub fn incremental_start(&self, watermark: NaiveDate, overlap_days: u32) -> NaiveDate {
        let start = watermark
            .checked_sub_days(Days::new(u64::from(overlap_days)))
            .unwrap_or(NaiveDate::MIN);
        start.max(self.retention_boundary)
    }

    /// Half-open range `[Jan 1 of (year - years), Jan 1 of year)` covering the
    /// last `years` closed calendar years.
    pub fn snapshot_range(&self, years: u32) -> Option<(NaiveDate, NaiveDate)> {
        let start = self
            .retention_boundary
            .checked_sub_months(Months::new(years.checked_mul(12)?))?;
        Some((start, self.retention_boundary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_retention_boundary_is_new_year() {
        let window = SyncWindow::starting(date(2025, 11, 17));
        assert_eq!(window.retention_boundary(), date(2025, 1, 1));
        assert_eq!(SyncWindow::starting(date(2024, 1, 1)).retention_boundary(), date(2024, 1, 1));
        assert_eq!(SyncWindow::starting(date(2024, 12, 31)).retention_boundary(), date(2024, 1, 1));
    }

    #[test]
    fn test_incremental_start_applies_overlap() {
        let window = SyncWindow::starting(date(2025, 6, 15));
        assert_eq!(window.incremental_start(date(2025, 6, 10), 3), date(2025, 6, 7));
    }

    #[test]
    fn test_incremental_start_clamped_to_boundary() {
        let window = SyncWindow::starting(date(2025, 1, 2));
        assert_eq!(window.incremental_start(date(2025, 1, 2), 3), date(2025, 1, 1));
        assert_eq!(window.incremental_start(date(2023, 8, 1), 3), date(2025, 1, 1));
    }

    #[test]
    fn test_snapshot_range() {
        let window = SyncWindow::starting(date(2025, 1, 2));
        assert_eq!(window.snapshot_range(2), Some((date(2023, 1, 1), date(2025, 1, 1))));
    }
}
