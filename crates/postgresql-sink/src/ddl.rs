//! Postgres DDL generation from table specs.

use sync_core::{SemanticType, TableSyncSpec};

/// Quote a Postgres identifier.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `"schema"."table"`
pub fn qualified(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}

/// Trait for generating DDL type strings.
pub trait ToDdl {
    /// Column type for a semantic type.
    fn to_ddl(&self, ty: SemanticType) -> &'static str;

    /// `CREATE TABLE IF NOT EXISTS` for a table spec, with its primary key.
    fn to_create_table(&self, schema: &str, table: &TableSyncSpec) -> String;
}

/// PostgreSQL DDL generator.
pub struct PostgreSQLDdl;

impl ToDdl for PostgreSQLDdl {
    fn to_ddl(&self, ty: SemanticType) -> &'static str {
        match ty {
            SemanticType::Integer => "INTEGER",
            SemanticType::Numeric => "NUMERIC",
            SemanticType::Text => "TEXT",
            SemanticType::Date => "DATE",
            SemanticType::Boolean => "BOOLEAN",
        }
    }

    fn to_create_table(&self, schema: &str, table: &TableSyncSpec) -> String {
        let mut defs: Vec<String> = table
            .columns
            .iter()
            .map(|column| {
                let null_clause = if column.nullable { "" } else { " NOT NULL" };
                format!(
                    "  {} {}{}",
                    quote_ident(column.destination_name()),
                    self.to_ddl(column.destination_type()),
                    null_clause
                )
            })
            .collect();
        if let Some(pk) = &table.primary_key {
            defs.push(format!("  PRIMARY KEY ({})", quote_ident(pk)));
        }

        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n{}\n)",
            qualified(schema, &table.name),
            defs.join(",\n")
        )
    }
}

impl PostgreSQLDdl {
    pub fn to_create_schema(&self, schema: &str) -> String {
        format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(schema))
    }

    /// Adds a primary key to a table created before the key was declared.
    pub fn to_add_primary_key(&self, schema: &str, table: &str, pk: &str) -> String {
        format!(
            "ALTER TABLE {} ADD PRIMARY KEY ({})",
            qualified(schema, table),
            quote_ident(pk)
        )
    }

    /// Views and foreign keys built on the table go with it.
    pub fn to_drop_table(&self, schema: &str, table: &str) -> String {
        format!("DROP TABLE IF EXISTS {} CASCADE", qualified(schema, table))
    }

    /// Tables holding foreign keys into this one are truncated too.
    pub fn to_truncate(&self, schema: &str, table: &str) -> String {
        format!("TRUNCATE TABLE {} CASCADE", qualified(schema, table))
    }
}
