//! Conversion from TDS column data to [`SourceValue`].

use anyhow::Result;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use sync_core::SourceValue;
use tiberius::{ColumnData, FromSql};

fn numeric_to_decimal(value: i128, scale: u8) -> SourceValue {
    Decimal::try_from_i128_with_scale(value, u32::from(scale))
        .map(SourceValue::Decimal)
        .unwrap_or_else(|_| SourceValue::Float(value as f64 / 10f64.powi(i32::from(scale))))
}

/// Convert one TDS value. Binary and XML payloads are not synced and read as NULL.
pub fn convert(data: &ColumnData<'static>) -> Result<SourceValue> {
    let value = match data {
        ColumnData::U8(v) => v.map(|v| SourceValue::Int(i64::from(v))),
        ColumnData::I16(v) => v.map(|v| SourceValue::Int(i64::from(v))),
        ColumnData::I32(v) => v.map(|v| SourceValue::Int(i64::from(v))),
        ColumnData::I64(v) => v.map(SourceValue::Int),
        ColumnData::F32(v) => v.map(|v| SourceValue::Float(f64::from(v))),
        ColumnData::F64(v) => v.map(SourceValue::Float),
        ColumnData::Bit(v) => v.map(SourceValue::Bool),
        ColumnData::String(v) => v.as_ref().map(|s| SourceValue::Text(s.to_string())),
        ColumnData::Guid(v) => v.as_ref().map(|g| SourceValue::Text(g.to_string())),
        ColumnData::Numeric(v) => v.as_ref().map(|n| numeric_to_decimal(n.value(), n.scale())),
        ColumnData::Date(_) => NaiveDate::from_sql(data)?.map(SourceValue::Date),
        ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_) => {
            NaiveDateTime::from_sql(data)?.map(SourceValue::DateTime)
        }
        ColumnData::DateTimeOffset(_) => {
            DateTime::<Utc>::from_sql(data)?.map(|dt| SourceValue::DateTime(dt.naive_utc()))
        }
        ColumnData::Time(_) => {
            NaiveTime::from_sql(data)?.map(|t| SourceValue::Text(t.format("%H:%M:%S").to_string()))
        }
        ColumnData::Binary(_) | ColumnData::Xml(_) => None,
    };
    Ok(value.unwrap_or(SourceValue::Null))
}
