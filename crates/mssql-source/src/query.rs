//! Structured extraction plans.
//!
//! A [`SourceQuery`] says which rows of a table to read without committing to
//! a SQL dialect. The SQL Server reader renders it to T-SQL; test doubles
//! evaluate it directly.

use chrono::NaiveDate;
use sync_core::{ExtractionStrategy, ParentLink, RowFilter, TableSyncSpec};

/// Date range applied to the table's date column (or its parent's).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateScope {
    /// No date predicate
    Unbounded,
    /// `since <= date` and, when set, `date < until`
    Range {
        since: NaiveDate,
        until: Option<NaiveDate>,
    },
}

impl DateScope {
    pub fn since(since: NaiveDate) -> Self {
        DateScope::Range { since, until: None }
    }

    pub fn between(since: NaiveDate, until: NaiveDate) -> Self {
        DateScope::Range {
            since,
            until: Some(until),
        }
    }

    pub fn contains(&self, date: Option<NaiveDate>) -> bool {
        match (self, date) {
            (DateScope::Unbounded, _) => true,
            (DateScope::Range { .. }, None) => false,
            (DateScope::Range { since, until }, Some(date)) => {
                date >= *since && until.map_or(true, |until| date < until)
            }
        }
    }

    pub fn lower_bound(&self) -> Option<NaiveDate> {
        match self {
            DateScope::Unbounded => None,
            DateScope::Range { since, .. } => Some(*since),
        }
    }
}

/// Which column the date scope applies to.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// The whole table; any date scope is ignored
    Table,
    /// A date column on the table itself
    Direct { column: String },
    /// The parent's date column, reached through the join key.
    /// Rows carry the parent date as one extra trailing value.
    ViaParent(ParentLink),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceQuery {
    pub table: String,
    /// Source column names, in output order
    pub columns: Vec<String>,
    pub selection: Selection,
    pub scope: DateScope,
    /// Predicates on the table's own columns
    pub filter: RowFilter,
}

impl SourceQuery {
    /// Plan the read of `spec` restricted to `scope`.
    pub fn for_table(spec: &TableSyncSpec, scope: DateScope) -> Self {
        let selection = match &spec.extraction {
            ExtractionStrategy::FullScan => Selection::Table,
            ExtractionStrategy::DirectDateFilter { column } => Selection::Direct {
                column: column.clone(),
            },
            ExtractionStrategy::ParentJoinFilter(link) => Selection::ViaParent(link.clone()),
        };
        let scope = match selection {
            Selection::Table => DateScope::Unbounded,
            _ => scope,
        };
        Self {
            table: spec.name.clone(),
            columns: spec.columns.iter().map(|c| c.source.clone()).collect(),
            selection,
            scope,
            filter: spec.filter.clone(),
        }
    }

    /// Position, within each returned row, of the value that drives the watermark.
    pub fn date_index(&self) -> Option<usize> {
        match &self.selection {
            Selection::Table => None,
            Selection::Direct { column } => self.columns.iter().position(|c| c == column),
            Selection::ViaParent(_) => Some(self.columns.len()),
        }
    }

    /// Number of values in each returned row.
    pub fn row_width(&self) -> usize {
        match self.selection {
            Selection::ViaParent(_) => self.columns.len() + 1,
            _ => self.columns.len(),
        }
    }
}
