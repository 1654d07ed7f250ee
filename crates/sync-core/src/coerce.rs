//! Value coercion from loosely typed source values to destination types.
//!
//! Coercion is total: a value that cannot be represented in the target type
//! becomes a typed NULL instead of failing the row.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::schema::{ColumnOverride, SchemaRegistry, TableSyncSpec};
use crate::types::SemanticType;
use crate::values::{ColumnRow, ColumnValue, SourceValue};

const DATE_FORMATS: &[&str] = &["%Y-%m-%d"];
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
];
const DOTTED_FORMATS: &[&str] = &["%d.%m.%Y", "%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y"];
const FALSE_TOKENS: &[&str] = &["", "0", "n", "no", "f", "false", "nao", "não"];

/// Parse an ISO-style date or datetime string, keeping only the date part.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
                .map(|dt| dt.date())
        })
}

/// Parse a legacy day-first date (`DD.MM.YYYY` and close variants).
pub fn parse_dotted_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    DOTTED_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
}

fn non_empty(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn float_to_i32(value: f64) -> Option<i32> {
    if !value.is_finite() {
        return None;
    }
    let truncated = value.trunc();
    if truncated < f64::from(i32::MIN) || truncated > f64::from(i32::MAX) {
        return None;
    }
    Some(truncated as i32)
}

fn to_integer(value: &SourceValue) -> Option<i32> {
    match value {
        SourceValue::Int(v) => i32::try_from(*v).ok(),
        SourceValue::Float(v) => float_to_i32(*v),
        SourceValue::Decimal(v) => v.trunc().to_i32(),
        SourceValue::Bool(b) => Some(i32::from(*b)),
        SourceValue::Text(s) => {
            let s = non_empty(s)?;
            match s.parse::<i64>() {
                Ok(v) => i32::try_from(v).ok(),
                Err(_) => s.parse::<f64>().ok().and_then(float_to_i32),
            }
        }
        SourceValue::Null | SourceValue::Date(_) | SourceValue::DateTime(_) => None,
    }
}

fn decimal_from_text(text: &str) -> Option<Decimal> {
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
}

fn to_numeric(value: &SourceValue) -> Option<Decimal> {
    match value {
        SourceValue::Int(v) => Some(Decimal::from(*v)),
        SourceValue::Float(v) if v.is_finite() => decimal_from_text(&v.to_string()),
        SourceValue::Float(_) => None,
        SourceValue::Decimal(v) => Some(*v),
        SourceValue::Bool(b) => Some(Decimal::from(i32::from(*b))),
        SourceValue::Text(s) => decimal_from_text(non_empty(s)?),
        SourceValue::Null | SourceValue::Date(_) | SourceValue::DateTime(_) => None,
    }
}

fn to_text(value: &SourceValue) -> Option<String> {
    match value {
        SourceValue::Text(s) => non_empty(s).map(str::to_string),
        other => other.to_text(),
    }
}

fn to_date(value: &SourceValue) -> Option<NaiveDate> {
    value.as_date()
}

fn to_boolean(value: &SourceValue) -> Option<bool> {
    match value {
        SourceValue::Bool(b) => Some(*b),
        SourceValue::Int(v) => Some(*v != 0),
        SourceValue::Float(v) => Some(*v != 0.0),
        SourceValue::Decimal(v) => Some(!v.is_zero()),
        SourceValue::Text(s) => {
            let token = s.trim().to_lowercase();
            Some(!FALSE_TOKENS.contains(&token.as_str()))
        }
        SourceValue::Null | SourceValue::Date(_) | SourceValue::DateTime(_) => None,
    }
}

/// Coerce a source value into the target destination type.
pub fn coerce(value: &SourceValue, target: SemanticType) -> ColumnValue {
    match target {
        SemanticType::Integer => ColumnValue::Integer(to_integer(value)),
        SemanticType::Numeric => ColumnValue::Numeric(to_numeric(value)),
        SemanticType::Text => ColumnValue::Text(to_text(value)),
        SemanticType::Date => ColumnValue::Date(to_date(value)),
        SemanticType::Boolean => ColumnValue::Boolean(to_boolean(value)),
    }
}

/// Coerce with an optional column override applied.
pub fn coerce_with(
    value: &SourceValue,
    target: SemanticType,
    rule: Option<&ColumnOverride>,
) -> ColumnValue {
    match (rule, target) {
        (Some(ColumnOverride::DefaultText { value: sentinel }), SemanticType::Text) => {
            ColumnValue::Text(to_text(value).or_else(|| Some(sentinel.clone())))
        }
        (Some(ColumnOverride::DottedDate), SemanticType::Date) => match value {
            SourceValue::Text(s) => ColumnValue::Date(parse_dotted_date(s)),
            other => ColumnValue::Date(to_date(other)),
        },
        _ => coerce(value, target),
    }
}

/// Per-table coercion plan: destination type and override for each column.
#[derive(Debug, Clone)]
pub struct RowCoercer {
    plan: Vec<(SemanticType, Option<ColumnOverride>)>,
}

impl RowCoercer {
    pub fn for_table(registry: &SchemaRegistry, table: &TableSyncSpec) -> Self {
        let plan = table
            .columns
            .iter()
            .map(|column| {
                (
                    column.destination_type(),
                    registry.override_for(&table.name, &column.source).cloned(),
                )
            })
            .collect();
        Self { plan }
    }

    pub fn width(&self) -> usize {
        self.plan.len()
    }

    /// Coerce a source row. Extra trailing source values are ignored and
    /// missing ones become NULL.
    pub fn coerce_row(&self, row: &[SourceValue]) -> ColumnRow {
        self.plan
            .iter()
            .enumerate()
            .map(|(i, (ty, rule))| {
                let value = row.get(i).unwrap_or(&SourceValue::Null);
                coerce_with(value, *ty, rule.as_ref())
            })
            .collect()
    }
}
