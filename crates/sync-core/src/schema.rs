//! Declarative table registry.
//!
//! Each synced table is described by a [`TableSyncSpec`]: its column mapping,
//! how rows are selected incrementally, which predicates rows must pass, and
//! which destination column drives retention. Column-specific coercion rules
//! live alongside as [`CoercionOverride`] entries keyed by (table, source column).
//!
//! Registries can be built in code or loaded from YAML:
//!
//! ```yaml
//! tables:
//!   - name: ft
//!     description: invoices
//!     primary_key: invoice_id
//!     retention_column: invoice_date
//!     extraction:
//!       kind: direct_date_filter
//!       column: fdata
//!     columns:
//!       - { source: ftstamp, destination: invoice_id, source_type: text, nullable: false }
//!       - { source: fdata, destination: invoice_date, source_type: date }
//! overrides:
//!   - { table: ft, column: vendnm, rule: { kind: default_text, value: "IMACX" } }
//! ```

use crate::types::SemanticType;
use crate::values::SourceValue;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

// ============================================================================
// Error Types
// ============================================================================

/// Error type for registry construction and lookup.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// Error reading registry file
    #[error("Failed to read registry file: {0}")]
    IoError(#[from] std::io::Error),

    /// Error parsing YAML
    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Table '{0}' is declared more than once")]
    DuplicateTable(String),

    #[error("Table '{0}' has no columns")]
    NoColumns(String),

    #[error("Column '{column}' not found in table '{table}'")]
    ColumnNotFound { table: String, column: String },

    #[error("Column '{column}' is mapped more than once in table '{table}'")]
    DuplicateColumn { table: String, column: String },

    #[error("Table '{table}' references unknown parent table '{parent}'")]
    UnknownParent { table: String, parent: String },

    #[error("Retention column '{column}' of table '{table}' must be a date column")]
    RetentionNotDate { table: String, column: String },

    #[error("Table '{table}' has no retention column and neither does its parent '{parent}'")]
    NoRetention { table: String, parent: String },
}

// ============================================================================
// Columns
// ============================================================================

fn default_true() -> bool {
    true
}

/// Mapping of one source column to one destination column.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnSpec {
    /// Column name in the source table
    pub source: String,

    /// Column name in the destination table. Unmapped columns keep the source name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,

    /// Declared source type
    pub source_type: SemanticType,

    /// Destination type. Defaults to the source type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_type: Option<SemanticType>,

    #[serde(default = "default_true")]
    pub nullable: bool,
}

impl ColumnSpec {
    pub fn new(source: impl Into<String>, source_type: SemanticType) -> Self {
        Self {
            source: source.into(),
            destination: None,
            source_type,
            destination_type: None,
            nullable: true,
        }
    }

    /// Rename the column on the destination side.
    pub fn mapped(mut self, destination: impl Into<String>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    /// Store the column with a different destination type.
    pub fn stored_as(mut self, destination_type: SemanticType) -> Self {
        self.destination_type = Some(destination_type);
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn destination_name(&self) -> &str {
        self.destination.as_deref().unwrap_or(&self.source)
    }

    pub fn destination_type(&self) -> SemanticType {
        self.destination_type.unwrap_or(self.source_type)
    }
}

// ============================================================================
// Row filters
// ============================================================================

/// A single source-side row predicate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Predicate {
    /// Column is not NULL and not zero
    NonZero { column: String },
    /// Flag column is unset: NULL, empty, '0' or 'N'
    NotFlagged { column: String },
    /// Column equals a literal
    Equals { column: String, value: String },
    /// Free-form SQL condition, only honored by SQL sources
    Raw { sql: String },
}

impl Predicate {
    pub fn column(&self) -> Option<&str> {
        match self {
            Predicate::NonZero { column }
            | Predicate::NotFlagged { column }
            | Predicate::Equals { column, .. } => Some(column.as_str()),
            Predicate::Raw { .. } => None,
        }
    }

    /// Evaluate the predicate against a single value. Raw predicates always pass.
    pub fn accepts(&self, value: &SourceValue) -> bool {
        match self {
            Predicate::NonZero { .. } => !value.is_null() && !value.is_zero(),
            Predicate::NotFlagged { .. } => !value.is_flag_set(),
            Predicate::Equals { value: expected, .. } => {
                value.to_text().as_deref() == Some(expected.as_str())
            }
            Predicate::Raw { .. } => true,
        }
    }
}

/// Conjunction of predicates. An empty filter accepts every row.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct RowFilter {
    pub predicates: Vec<Predicate>,
}

impl RowFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn and(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Predicate> {
        self.predicates.iter()
    }
}

// ============================================================================
// Extraction strategy
// ============================================================================

/// Parent table relationship used by child tables without their own date column.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParentLink {
    /// Parent table name
    pub table: String,
    /// Join key, present under the same source name in parent and child
    pub key: String,
    /// Parent source column that carries the date
    pub date_column: String,
    /// Predicates on parent columns
    #[serde(default, skip_serializing_if = "RowFilter::is_empty")]
    pub filter: RowFilter,
}

/// How rows are selected for an incremental run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractionStrategy {
    /// Filter on a date column of the table itself
    DirectDateFilter { column: String },
    /// Join to a parent table and filter on the parent's date
    ParentJoinFilter(ParentLink),
    /// No date column; every run reads the whole table
    FullScan,
}

// ============================================================================
// Coercion overrides
// ============================================================================

/// Column-specific coercion rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnOverride {
    /// Substitute a sentinel when the value is NULL or empty
    DefaultText { value: String },
    /// Parse legacy day-first dotted dates (DD.MM.YYYY)
    DottedDate,
}

/// Override bound to a (table, source column) pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CoercionOverride {
    pub table: String,
    pub column: String,
    pub rule: ColumnOverride,
}

impl CoercionOverride {
    pub fn new(table: impl Into<String>, column: impl Into<String>, rule: ColumnOverride) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            rule,
        }
    }
}

// ============================================================================
// Table spec
// ============================================================================

/// Complete sync configuration for one table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableSyncSpec {
    /// Source table name, also used as the destination table name
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Ordered column mapping
    pub columns: Vec<ColumnSpec>,

    /// Destination name of the primary key column
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<String>,

    pub extraction: ExtractionStrategy,

    /// Destination date column used for retention purges
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention_column: Option<String>,

    /// Predicates on the table's own columns
    #[serde(default, skip_serializing_if = "RowFilter::is_empty")]
    pub filter: RowFilter,

    /// Extra predicates applied only when archiving closed years
    #[serde(default, skip_serializing_if = "RowFilter::is_empty")]
    pub archive_filter: RowFilter,

    /// Skip the table when it was synced within the job's skip window
    #[serde(default)]
    pub skip_when_recent: bool,
}

impl TableSyncSpec {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        extraction: ExtractionStrategy,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            columns: Vec::new(),
            primary_key: None,
            extraction,
            retention_column: None,
            filter: RowFilter::default(),
            archive_filter: RowFilter::default(),
            skip_when_recent: false,
        }
    }

    pub fn column(mut self, column: ColumnSpec) -> Self {
        self.columns.push(column);
        self
    }

    pub fn primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = Some(column.into());
        self
    }

    pub fn retention(mut self, column: impl Into<String>) -> Self {
        self.retention_column = Some(column.into());
        self
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter.predicates.push(predicate);
        self
    }

    pub fn archive_filter(mut self, predicate: Predicate) -> Self {
        self.archive_filter.predicates.push(predicate);
        self
    }

    pub fn skip_when_recent(mut self) -> Self {
        self.skip_when_recent = true;
        self
    }

    /// True unless the table is always read in full.
    pub fn is_incremental(&self) -> bool {
        !matches!(self.extraction, ExtractionStrategy::FullScan)
    }

    pub fn parent_link(&self) -> Option<&ParentLink> {
        match &self.extraction {
            ExtractionStrategy::ParentJoinFilter(link) => Some(link),
            _ => None,
        }
    }

    pub fn source_columns(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.source.as_str()).collect()
    }

    pub fn destination_columns(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.destination_name()).collect()
    }

    pub fn destination_types(&self) -> Vec<SemanticType> {
        self.columns.iter().map(|c| c.destination_type()).collect()
    }

    pub fn source_index(&self, source: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.source == source)
    }

    pub fn destination_index(&self, destination: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.destination_name() == destination)
    }

    pub fn primary_key_index(&self) -> Option<usize> {
        self.primary_key
            .as_deref()
            .and_then(|pk| self.destination_index(pk))
    }

    fn missing(&self, column: &str) -> SchemaError {
        SchemaError::ColumnNotFound {
            table: self.name.clone(),
            column: column.to_string(),
        }
    }

    /// Checks that only need the table itself.
    fn validate_local(&self) -> Result<(), SchemaError> {
        if self.columns.is_empty() {
            return Err(SchemaError::NoColumns(self.name.clone()));
        }

        let mut sources = HashSet::new();
        let mut destinations = HashSet::new();
        for column in &self.columns {
            if !sources.insert(column.source.as_str()) {
                return Err(SchemaError::DuplicateColumn {
                    table: self.name.clone(),
                    column: column.source.clone(),
                });
            }
            if !destinations.insert(column.destination_name()) {
                return Err(SchemaError::DuplicateColumn {
                    table: self.name.clone(),
                    column: column.destination_name().to_string(),
                });
            }
        }

        if let Some(pk) = &self.primary_key {
            if self.destination_index(pk).is_none() {
                return Err(self.missing(pk));
            }
        }

        if let Some(retention) = &self.retention_column {
            let idx = self
                .destination_index(retention)
                .ok_or_else(|| self.missing(retention))?;
            if self.columns[idx].destination_type() != SemanticType::Date {
                return Err(SchemaError::RetentionNotDate {
                    table: self.name.clone(),
                    column: retention.clone(),
                });
            }
        }

        if let ExtractionStrategy::DirectDateFilter { column } = &self.extraction {
            if self.source_index(column).is_none() {
                return Err(self.missing(column));
            }
        }

        let predicates = self.filter.iter().chain(self.archive_filter.iter());
        for column in predicates.filter_map(Predicate::column) {
            if self.source_index(column).is_none() {
                return Err(self.missing(column));
            }
        }

        Ok(())
    }
}

/// How expired rows of a table are located.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetentionPlan<'a> {
    /// Delete rows whose own date column is older than the boundary
    Direct { column: &'a str },
    /// Delete rows whose parent row is older than the boundary
    ViaParent {
        parent_table: &'a str,
        child_key: &'a str,
        parent_key: &'a str,
        parent_column: &'a str,
    },
}

// ============================================================================
// Registry
// ============================================================================

#[derive(Debug, Deserialize)]
struct RegistryFile {
    tables: Vec<TableSyncSpec>,
    #[serde(default)]
    overrides: Vec<CoercionOverride>,
}

/// Validated collection of table specs plus coercion overrides.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    tables: Vec<TableSyncSpec>,
    index: HashMap<String, usize>,
    overrides: HashMap<(String, String), ColumnOverride>,
}

impl SchemaRegistry {
    /// Build and validate a registry.
    pub fn new(
        tables: Vec<TableSyncSpec>,
        overrides: Vec<CoercionOverride>,
    ) -> Result<Self, SchemaError> {
        let mut index = HashMap::new();
        for (i, table) in tables.iter().enumerate() {
            if index.insert(table.name.clone(), i).is_some() {
                return Err(SchemaError::DuplicateTable(table.name.clone()));
            }
        }

        let registry = Self {
            tables,
            index,
            overrides: overrides
                .into_iter()
                .map(|o| ((o.table, o.column), o.rule))
                .collect(),
        };
        registry.validate()?;
        Ok(registry)
    }

    /// Parse a registry from a YAML string.
    pub fn from_yaml(content: &str) -> Result<Self, SchemaError> {
        let file: RegistryFile = serde_yaml::from_str(content)?;
        Self::new(file.tables, file.overrides)
    }

    /// Load a registry from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    fn validate(&self) -> Result<(), SchemaError> {
        for table in &self.tables {
            table.validate_local()?;

            if let Some(link) = table.parent_link() {
                let parent = self
                    .get(&link.table)
                    .ok_or_else(|| SchemaError::UnknownParent {
                        table: table.name.clone(),
                        parent: link.table.clone(),
                    })?;
                if table.source_index(&link.key).is_none() {
                    return Err(table.missing(&link.key));
                }
                for column in [link.key.as_str(), link.date_column.as_str()]
                    .into_iter()
                    .chain(link.filter.iter().filter_map(Predicate::column))
                {
                    if parent.source_index(column).is_none() {
                        return Err(parent.missing(column));
                    }
                }
                if table.retention_column.is_none() && parent.retention_column.is_none() {
                    return Err(SchemaError::NoRetention {
                        table: table.name.clone(),
                        parent: parent.name.clone(),
                    });
                }
            }
        }

        for (table, column) in self.overrides.keys() {
            let spec = self.table(table)?;
            if spec.source_index(column).is_none() {
                return Err(spec.missing(column));
            }
        }

        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&TableSyncSpec> {
        self.index.get(name).map(|&i| &self.tables[i])
    }

    pub fn table(&self, name: &str) -> Result<&TableSyncSpec, SchemaError> {
        self.get(name)
            .ok_or_else(|| SchemaError::TableNotFound(name.to_string()))
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableSyncSpec> {
        self.tables.iter()
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn override_for(&self, table: &str, column: &str) -> Option<&ColumnOverride> {
        self.overrides
            .get(&(table.to_string(), column.to_string()))
    }

    pub fn parent_of(&self, table: &TableSyncSpec) -> Option<&TableSyncSpec> {
        table.parent_link().and_then(|link| self.get(&link.table))
    }

    /// Resolve how a table's expired rows are found, if it has a retention policy.
    pub fn retention_plan<'a>(&'a self, table: &'a TableSyncSpec) -> Option<RetentionPlan<'a>> {
        if let Some(column) = table.retention_column.as_deref() {
            return Some(RetentionPlan::Direct { column });
        }

        let link = table.parent_link()?;
        let parent = self.get(&link.table)?;
        let parent_column = parent.retention_column.as_deref()?;
        let child_key = table.columns[table.source_index(&link.key)?].destination_name();
        let parent_key = parent.columns[parent.source_index(&link.key)?].destination_name();
        Some(RetentionPlan::ViaParent {
            parent_table: parent.name.as_str(),
            child_key,
            parent_key,
            parent_column,
        })
    }
}
