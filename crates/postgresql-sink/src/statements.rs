//! Upsert and purge statement builders.

use sync_core::RetentionPlan;

use crate::ddl::{qualified, quote_ident};

/// Postgres wire protocol limit on bound parameters per statement.
pub const MAX_PARAMS: usize = 65_535;

/// Rows per statement so that `rows * width` stays within [`MAX_PARAMS`].
pub fn rows_per_statement(width: usize, batch_size: usize) -> usize {
    if width == 0 {
        return batch_size.max(1);
    }
    (MAX_PARAMS / width).min(batch_size).max(1)
}

/// Multi-row `INSERT` for `rows` rows of `columns`.
///
/// With a primary key the statement resolves conflicts in favour of the new
/// values; a table whose only column is the key ignores conflicts. Without a
/// key it is a plain insert.
pub fn upsert_sql(
    schema: &str,
    table: &str,
    columns: &[&str],
    primary_key: Option<&str>,
    rows: usize,
) -> String {
    let width = columns.len();
    let column_list = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    let values = (0..rows)
        .map(|row| {
            let placeholders = (1..=width)
                .map(|col| format!("${}", row * width + col))
                .collect::<Vec<_>>()
                .join(", ");
            format!("({placeholders})")
        })
        .collect::<Vec<_>>()
        .join(", ");

    let mut sql = format!(
        "INSERT INTO {} ({column_list}) VALUES {values}",
        qualified(schema, table)
    );

    if let Some(pk) = primary_key {
        let updates = columns
            .iter()
            .filter(|c| **c != pk)
            .map(|c| format!("{col} = EXCLUDED.{col}", col = quote_ident(c)))
            .collect::<Vec<_>>();
        if updates.is_empty() {
            sql.push_str(&format!(" ON CONFLICT ({}) DO NOTHING", quote_ident(pk)));
        } else {
            sql.push_str(&format!(
                " ON CONFLICT ({}) DO UPDATE SET {}",
                quote_ident(pk),
                updates.join(", ")
            ));
        }
    }

    sql
}

/// `DELETE` removing rows older than `$1` according to a retention plan.
pub fn purge_sql(schema: &str, table: &str, plan: &RetentionPlan<'_>) -> String {
    match plan {
        RetentionPlan::Direct { column } => format!(
            "DELETE FROM {} WHERE {} < $1",
            qualified(schema, table),
            quote_ident(column)
        ),
        RetentionPlan::ViaParent {
            parent_table,
            child_key,
            parent_key,
            parent_column,
        } => format!(
            "DELETE FROM {} AS child USING {} AS parent \
             WHERE child.{} = parent.{} AND parent.{} < $1",
            qualified(schema, table),
            qualified(schema, parent_table),
            quote_ident(child_key),
            quote_ident(parent_key),
            quote_ident(parent_column)
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_updates_non_key_columns() {
        let sql = upsert_sql("phc", "ft", &["invoice_id", "net_value"], Some("invoice_id"), 2);
        assert_eq!(
            sql,
            "INSERT INTO \"phc\".\"ft\" (\"invoice_id\", \"net_value\") VALUES ($1, $2), ($3, $4) \
             ON CONFLICT (\"invoice_id\") DO UPDATE SET \"net_value\" = EXCLUDED.\"net_value\""
        );
    }

    #[test]
    fn test_upsert_key_only_table_does_nothing_on_conflict() {
        let sql = upsert_sql("phc", "tags", &["tag"], Some("tag"), 1);
        assert!(sql.ends_with("ON CONFLICT (\"tag\") DO NOTHING"));
    }

    #[test]
    fn test_insert_without_key() {
        let sql = upsert_sql("phc", "log", &["a", "b"], None, 1);
        assert_eq!(sql, "INSERT INTO \"phc\".\"log\" (\"a\", \"b\") VALUES ($1, $2)");
    }

    #[test]
    fn test_rows_per_statement_respects_param_limit() {
        assert_eq!(rows_per_statement(10, 1000), 1000);
        assert_eq!(rows_per_statement(100, 1000), 655);
        assert_eq!(rows_per_statement(70_000, 1000), 1);
        assert_eq!(rows_per_statement(0, 50), 50);
    }

    #[test]
    fn test_direct_purge() {
        let sql = purge_sql(
            "phc",
            "ft",
            &RetentionPlan::Direct {
                column: "invoice_date",
            },
        );
        assert_eq!(sql, "DELETE FROM \"phc\".\"ft\" WHERE \"invoice_date\" < $1");
    }

    #[test]
    fn test_purge_via_parent() {
        let sql = purge_sql(
            "phc",
            "bi",
            &RetentionPlan::ViaParent {
                parent_table: "bo",
                child_key: "document_id",
                parent_key: "document_id",
                parent_column: "document_date",
            },
        );
        assert_eq!(
            sql,
            "DELETE FROM \"phc\".\"bi\" AS child USING \"phc\".\"bo\" AS parent \
             WHERE child.\"document_id\" = parent.\"document_id\" \
             AND parent.\"document_date\" < $1"
        );
    }
}
