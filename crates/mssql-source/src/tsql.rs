//! T-SQL rendering of [`SourceQuery`] plans.

use chrono::NaiveDate;
use sync_core::{Predicate, RowFilter};

use crate::query::{DateScope, Selection, SourceQuery};

/// Bound parameter of a rendered query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryParam {
    Date(NaiveDate),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedQuery {
    pub sql: String,
    pub params: Vec<QueryParam>,
}

/// Bracket-quote a SQL Server identifier.
pub fn quote_ident(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

struct Builder {
    conditions: Vec<String>,
    params: Vec<QueryParam>,
}

impl Builder {
    fn bind(&mut self, param: QueryParam) -> String {
        self.params.push(param);
        format!("@P{}", self.params.len())
    }

    fn date_range(&mut self, column: &str, scope: &DateScope) {
        if let DateScope::Range { since, until } = scope {
            let p = self.bind(QueryParam::Date(*since));
            self.conditions.push(format!("{column} >= {p}"));
            if let Some(until) = until {
                let p = self.bind(QueryParam::Date(*until));
                self.conditions.push(format!("{column} < {p}"));
            }
        }
    }

    fn filter(&mut self, filter: &RowFilter, prefix: &str) {
        for predicate in filter.iter() {
            let condition = match predicate {
                Predicate::NonZero { column } => {
                    let col = format!("{prefix}{}", quote_ident(column));
                    format!("{col} IS NOT NULL AND {col} <> 0")
                }
                Predicate::NotFlagged { column } => {
                    let col = format!("{prefix}{}", quote_ident(column));
                    format!("COALESCE(CONVERT(VARCHAR(10), {col}), '') IN ('', '0', 'N')")
                }
                Predicate::Equals { column, value } => {
                    let p = self.bind(QueryParam::Text(value.clone()));
                    format!("{prefix}{} = {p}", quote_ident(column))
                }
                Predicate::Raw { sql } => format!("({sql})"),
            };
            self.conditions.push(condition);
        }
    }

    fn finish(self, mut sql: String) -> RenderedQuery {
        if !self.conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.conditions.join(" AND "));
        }
        RenderedQuery {
            sql,
            params: self.params,
        }
    }
}

/// Render a plan as a parameterized T-SQL `SELECT` (`@P1`, `@P2`, ...).
pub fn render(query: &SourceQuery) -> RenderedQuery {
    let mut builder = Builder {
        conditions: Vec::new(),
        params: Vec::new(),
    };

    let sql = match &query.selection {
        Selection::Table | Selection::Direct { .. } => {
            let columns = query
                .columns
                .iter()
                .map(|c| quote_ident(c))
                .collect::<Vec<_>>()
                .join(", ");
            if let Selection::Direct { column } = &query.selection {
                builder.date_range(&quote_ident(column), &query.scope);
            }
            builder.filter(&query.filter, "");
            format!("SELECT {columns} FROM {}", quote_ident(&query.table))
        }
        Selection::ViaParent(link) => {
            let columns = query
                .columns
                .iter()
                .map(|c| format!("child.{}", quote_ident(c)))
                .collect::<Vec<_>>()
                .join(", ");
            let parent_date = format!("parent.{}", quote_ident(&link.date_column));
            builder.date_range(&parent_date, &query.scope);
            builder.filter(&query.filter, "child.");
            builder.filter(&link.filter, "parent.");
            format!(
                "SELECT {columns}, {parent_date} AS parent_date FROM {} AS child \
                 JOIN {} AS parent ON parent.{key} = child.{key}",
                quote_ident(&query.table),
                quote_ident(&link.table),
                key = quote_ident(&link.key),
            )
        }
    };

    builder.finish(sql)
}
