//! Typed parameter binding for coerced values.

use sync_core::ColumnValue;
use tokio_postgres::types::ToSql;

/// Box a value as a query parameter. NULLs keep their column type, so a NULL
/// NUMERIC binds as `Option<Decimal>` rather than an untyped NULL.
pub fn to_param(value: &ColumnValue) -> Box<dyn ToSql + Sync + Send> {
    match value {
        ColumnValue::Integer(v) => Box::new(*v),
        ColumnValue::Numeric(v) => Box::new(*v),
        ColumnValue::Text(v) => Box::new(v.clone()),
        ColumnValue::Date(v) => Box::new(*v),
        ColumnValue::Boolean(v) => Box::new(*v),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    #[test]
    fn test_null_params_are_typed() {
        assert_eq!(format!("{:?}", to_param(&ColumnValue::Numeric(None))), "None");
        assert_eq!(format!("{:?}", to_param(&ColumnValue::Text(None))), "None");
    }

    #[test]
    fn test_values_pass_through() {
        assert_eq!(
            format!("{:?}", to_param(&ColumnValue::Numeric(Some(Decimal::new(1250, 2))))),
            "Some(12.50)"
        );
        let date = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();
        assert_eq!(
            format!("{:?}", to_param(&ColumnValue::Date(Some(date)))),
            "Some(2025-01-31)"
        );
    }
}
