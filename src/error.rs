//! Error types for the database access layer.

use thiserror::Error;

/// Main error type for erdb operations.
#[derive(Error, Debug)]
pub enum ErdbError {
    /// Unknown table or field, missing primary key, unsupported key shape,
    /// or a query path that cannot be joined
    #[error("Schema error: {0}")]
    Schema(String),

    /// Holder/field type mismatch or an unsupported value conversion
    #[error("Type error: {0}")]
    Type(String),

    /// The schema cannot be changed without violating a foreign key
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// Parameter index outside the allocated holder range
    #[error("Parameter error: {0}")]
    Parameter(String),

    /// Error reported by the SQLite driver
    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),

    /// IO error (script files)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ErdbError {
    /// Create a Schema error
    pub fn schema(message: impl Into<String>) -> Self {
        ErdbError::Schema(message.into())
    }

    /// Create a Type error
    pub fn type_mismatch(message: impl Into<String>) -> Self {
        ErdbError::Type(message.into())
    }

    /// Create a Parameter error
    pub fn parameter(message: impl Into<String>) -> Self {
        ErdbError::Parameter(message.into())
    }

    /// Error for an operation that needs a single-column primary key.
    pub fn no_primary_key(operation: &str, table: &str) -> Self {
        ErdbError::Schema(format!(
            "Cannot do {} on table {}, which has no primary key.",
            operation, table
        ))
    }

    /// True for errors raised by the schema model rather than the driver.
    pub fn is_schema(&self) -> bool {
        matches!(self, ErdbError::Schema(_))
    }
}

/// Result type alias for erdb operations.
pub type Result<T> = std::result::Result<T, ErdbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ErdbError::no_primary_key("get-record", "FeatureToGroup");
        assert_eq!(
            err.to_string(),
            "Schema error: Cannot do get-record on table FeatureToGroup, which has no primary key."
        );
        assert!(err.is_schema());
        assert!(!ErdbError::parameter("x").is_schema());
    }

    #[test]
    fn test_from_rusqlite() {
        let err: ErdbError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, ErdbError::Sql(_)));
    }
}
