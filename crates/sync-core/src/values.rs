//! Row values on both sides of the pipeline.
//!
//! [`SourceValue`] is whatever the source driver handed us, loosely typed.
//! [`ColumnValue`] is the coerced value, tagged with its destination type so a
//! NULL still knows which Postgres type to bind as.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;

use crate::types::SemanticType;

/// A value read from the source system before coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl SourceValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SourceValue::Null)
    }

    /// True when the value is numerically zero. Non-numeric values are never zero.
    pub fn is_zero(&self) -> bool {
        match self {
            SourceValue::Int(v) => *v == 0,
            SourceValue::Float(v) => *v == 0.0,
            SourceValue::Decimal(v) => v.is_zero(),
            SourceValue::Text(s) => s.trim().parse::<f64>().map(|v| v == 0.0).unwrap_or(false),
            _ => false,
        }
    }

    /// True when the value reads as a set flag. Unset flags are NULL, false,
    /// zero and the texts `''`, `'0'` and `'N'`.
    pub fn is_flag_set(&self) -> bool {
        match self {
            SourceValue::Bool(b) => *b,
            SourceValue::Int(_) | SourceValue::Float(_) | SourceValue::Decimal(_) => !self.is_zero(),
            SourceValue::Text(s) => {
                let s = s.trim();
                !(s.is_empty() || s == "0" || s.eq_ignore_ascii_case("n"))
            }
            _ => false,
        }
    }

    /// Date part of a date-like value.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            SourceValue::Date(d) => Some(*d),
            SourceValue::DateTime(dt) => Some(dt.date()),
            SourceValue::Text(s) => crate::coerce::parse_date(s),
            _ => None,
        }
    }

    /// Textual rendering used for equality filters.
    pub fn to_text(&self) -> Option<String> {
        match self {
            SourceValue::Null => None,
            SourceValue::Bool(b) => Some(if *b { "1".into() } else { "0".into() }),
            SourceValue::Int(v) => Some(v.to_string()),
            SourceValue::Float(v) => Some(v.to_string()),
            SourceValue::Decimal(v) => Some(v.to_string()),
            SourceValue::Text(s) => Some(s.trim().to_string()),
            SourceValue::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
            SourceValue::DateTime(dt) => Some(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
        }
    }
}

impl From<&str> for SourceValue {
    fn from(value: &str) -> Self {
        SourceValue::Text(value.to_string())
    }
}

impl From<String> for SourceValue {
    fn from(value: String) -> Self {
        SourceValue::Text(value)
    }
}

impl From<i64> for SourceValue {
    fn from(value: i64) -> Self {
        SourceValue::Int(value)
    }
}

impl From<i32> for SourceValue {
    fn from(value: i32) -> Self {
        SourceValue::Int(i64::from(value))
    }
}

impl From<f64> for SourceValue {
    fn from(value: f64) -> Self {
        SourceValue::Float(value)
    }
}

impl From<bool> for SourceValue {
    fn from(value: bool) -> Self {
        SourceValue::Bool(value)
    }
}

impl From<Decimal> for SourceValue {
    fn from(value: Decimal) -> Self {
        SourceValue::Decimal(value)
    }
}

impl From<NaiveDate> for SourceValue {
    fn from(value: NaiveDate) -> Self {
        SourceValue::Date(value)
    }
}

impl From<NaiveDateTime> for SourceValue {
    fn from(value: NaiveDateTime) -> Self {
        SourceValue::DateTime(value)
    }
}

impl<T: Into<SourceValue>> From<Option<T>> for SourceValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(SourceValue::Null)
    }
}

/// A coerced destination value. `None` is a typed NULL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColumnValue {
    Integer(Option<i32>),
    Numeric(Option<Decimal>),
    Text(Option<String>),
    Date(Option<NaiveDate>),
    Boolean(Option<bool>),
}

impl ColumnValue {
    /// NULL of the given type.
    pub fn null(ty: SemanticType) -> Self {
        match ty {
            SemanticType::Integer => ColumnValue::Integer(None),
            SemanticType::Numeric => ColumnValue::Numeric(None),
            SemanticType::Text => ColumnValue::Text(None),
            SemanticType::Date => ColumnValue::Date(None),
            SemanticType::Boolean => ColumnValue::Boolean(None),
        }
    }

    pub fn semantic_type(&self) -> SemanticType {
        match self {
            ColumnValue::Integer(_) => SemanticType::Integer,
            ColumnValue::Numeric(_) => SemanticType::Numeric,
            ColumnValue::Text(_) => SemanticType::Text,
            ColumnValue::Date(_) => SemanticType::Date,
            ColumnValue::Boolean(_) => SemanticType::Boolean,
        }
    }

    pub fn is_null(&self) -> bool {
        match self {
            ColumnValue::Integer(v) => v.is_none(),
            ColumnValue::Numeric(v) => v.is_none(),
            ColumnValue::Text(v) => v.is_none(),
            ColumnValue::Date(v) => v.is_none(),
            ColumnValue::Boolean(v) => v.is_none(),
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            ColumnValue::Date(d) => *d,
            _ => None,
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        ColumnValue::Text(Some(value.into()))
    }
}

/// One source row, positionally aligned with the table's column list.
pub type SourceRow = Vec<SourceValue>;

/// One coerced row, positionally aligned with the table's destination columns.
pub type ColumnRow = Vec<ColumnValue>;
