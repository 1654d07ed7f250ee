//! Semantic column types.
//!
//! Every synced column is declared with one of these types on the source side
//! and one on the destination side. The destination type drives coercion and
//! the Postgres DDL.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Column type as understood by the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    /// 32-bit signed integer (Postgres `INTEGER`)
    Integer,
    /// Arbitrary precision decimal (Postgres `NUMERIC`)
    Numeric,
    /// Free text (Postgres `TEXT`)
    Text,
    /// Calendar date without time (Postgres `DATE`)
    Date,
    /// Boolean flag (Postgres `BOOLEAN`)
    Boolean,
}

impl SemanticType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SemanticType::Integer => "integer",
            SemanticType::Numeric => "numeric",
            SemanticType::Text => "text",
            SemanticType::Date => "date",
            SemanticType::Boolean => "boolean",
        }
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_names() {
        let ty: SemanticType = serde_yaml::from_str("numeric").unwrap();
        assert_eq!(ty, SemanticType::Numeric);
        assert_eq!(serde_yaml::to_string(&SemanticType::Boolean).unwrap().trim(), "boolean");
    }

    #[test]
    fn test_display() {
        assert_eq!(SemanticType::Date.to_string(), "date");
    }
}
