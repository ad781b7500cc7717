//! Logical field types
//!
//! SQLite only stores integers, reals, text, and blobs. The logical types layer a
//! small closed set of richer types (dates, locations, numeric vectors, booleans)
//! on top of those storage classes. Every logical type knows which storage class
//! it marshals into and how to build an empty value holder.

mod location;
mod value;

pub use location::{Location, LOCATION_ENCODED_LEN};
pub use value::{Payload, Value};

use crate::error::{ErdbError, Result};
use serde::Serialize;

/// The closed set of field types understood by the access layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogicalType {
    Integer,
    Real,
    Text,
    ByteVector,
    Date,
    Boolean,
    Location,
}

impl LogicalType {
    pub fn all() -> [LogicalType; 7] {
        [
            LogicalType::Integer,
            LogicalType::Real,
            LogicalType::Text,
            LogicalType::ByteVector,
            LogicalType::Date,
            LogicalType::Boolean,
            LogicalType::Location,
        ]
    }

    /// Type name as stored in the `_fields` metadata table
    pub fn name(&self) -> &'static str {
        match self {
            LogicalType::Integer => "INTEGER",
            LogicalType::Real => "DOUBLE",
            LogicalType::Text => "STRING",
            LogicalType::ByteVector => "DOUBLE_ARRAY",
            LogicalType::Date => "DATE",
            LogicalType::Boolean => "BOOLEAN",
            LogicalType::Location => "LOCATION",
        }
    }

    /// Parse a custom type name from the `_fields` metadata table.
    ///
    /// Accepts the canonical names returned by [`LogicalType::name`] plus the
    /// variant spellings (`REAL`, `TEXT`, `BYTE_VECTOR`), case-insensitively.
    pub fn parse_custom(name: &str) -> Result<LogicalType> {
        match name.trim().to_uppercase().as_str() {
            "INTEGER" => Ok(LogicalType::Integer),
            "DOUBLE" | "REAL" => Ok(LogicalType::Real),
            "STRING" | "TEXT" => Ok(LogicalType::Text),
            "DOUBLE_ARRAY" | "BYTE_VECTOR" => Ok(LogicalType::ByteVector),
            "DATE" => Ok(LogicalType::Date),
            "BOOLEAN" => Ok(LogicalType::Boolean),
            "LOCATION" => Ok(LogicalType::Location),
            _ => Err(ErdbError::type_mismatch(format!(
                "Invalid custom type \"{}\".",
                name
            ))),
        }
    }

    /// True if the type can be used in ORDER BY and relational filters
    pub fn is_comparable(&self) -> bool {
        !matches!(self, LogicalType::ByteVector)
    }

    /// The logical type whose native storage this type marshals into.
    pub fn storage_type(&self) -> LogicalType {
        match self {
            LogicalType::Date => LogicalType::Real,
            LogicalType::Boolean => LogicalType::Integer,
            LogicalType::Location => LogicalType::Text,
            other => *other,
        }
    }

    /// True if a custom override of this type may sit on a column whose
    /// native type parses to `native`.
    pub fn overrides(&self, native: LogicalType) -> bool {
        *self == native || self.storage_type() == native
    }

    /// Create a default-valued holder of this type.
    pub fn create(&self) -> Value {
        Value::new(*self)
    }
}

impl std::fmt::Display for LogicalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
