//! Engine adapters
//!
//! A dialect supplies the engine-specific pieces the access layer cannot derive
//! from the driver: identifier quoting, native type name parsing, and catalog
//! scoping for the metadata queries.

use crate::types::LogicalType;

/// Engine-specific behavior consumed by the connection and statement buffers.
pub trait Dialect: Send + Sync {
    /// Engine name, used in log messages
    fn name(&self) -> &'static str;

    /// Quote a single identifier (table or column name).
    fn quote(&self, name: &str) -> String;

    /// Map a declared native column type to a logical type.
    fn parse_type(&self, native: &str) -> LogicalType;

    /// Catalog used to scope metadata queries, if any
    fn catalog(&self) -> Option<&str> {
        None
    }

    /// Schema used to scope metadata queries, if any
    fn schema(&self) -> Option<&str> {
        None
    }
}

/// SQLite dialect: bracket quoting and affinity-style type parsing.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "SQLite"
    }

    fn quote(&self, name: &str) -> String {
        format!("[{}]", name.replace(']', "]]"))
    }

    fn parse_type(&self, native: &str) -> LogicalType {
        let native = native.to_uppercase();
        if native.contains("INT") {
            LogicalType::Integer
        } else if native.contains("CHAR") || native.contains("CLOB") || native.contains("TEXT") {
            LogicalType::Text
        } else if native.contains("BOOLEAN") {
            LogicalType::Integer
        } else if native.contains("BLOB") {
            LogicalType::ByteVector
        } else {
            LogicalType::Real
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote() {
        let dialect = SqliteDialect;
        assert_eq!(dialect.quote("Genome"), "[Genome]");
        assert_eq!(dialect.quote("odd]name"), "[odd]]name]");
    }

    #[test]
    fn test_parse_type() {
        let dialect = SqliteDialect;
        assert_eq!(dialect.parse_type("INTEGER"), LogicalType::Integer);
        assert_eq!(dialect.parse_type("bigint"), LogicalType::Integer);
        assert_eq!(dialect.parse_type("VARCHAR(30)"), LogicalType::Text);
        assert_eq!(dialect.parse_type("text"), LogicalType::Text);
        assert_eq!(dialect.parse_type("BOOLEAN"), LogicalType::Integer);
        assert_eq!(dialect.parse_type("BLOB"), LogicalType::ByteVector);
        assert_eq!(dialect.parse_type("DOUBLE"), LogicalType::Real);
        assert_eq!(dialect.parse_type(""), LogicalType::Real);
        assert!(dialect.catalog().is_none());
        assert!(dialect.schema().is_none());
    }
}
