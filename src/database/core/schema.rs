//! Metadata table management
//!
//! Every erdb database carries two permanent metadata tables. `_fields` overrides
//! the logical type and description of individual columns; `_diagram` records
//! where each table sits on the entity-relationship diagram.

use crate::error::Result;
use crate::types::LogicalType;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use std::collections::HashMap;

/// Name of the custom field type table
pub const FIELDS_TABLE: &str = "_fields";

/// Name of the diagram placement table
pub const DIAGRAM_TABLE: &str = "_diagram";

/// Schema definitions for the metadata tables
pub struct SchemaDefinitions;

impl SchemaDefinitions {
    /// SQL for creating the custom field type table
    pub const FIELDS: &'static str = r#"
        CREATE TABLE IF NOT EXISTS _fields (
            table_name VARCHAR(30) NOT NULL,
            field_name VARCHAR(30) NOT NULL,
            field_type VARCHAR(20) NOT NULL,
            description TEXT
        );
    "#;

    pub const FIELDS_INDEX: &'static str =
        "CREATE UNIQUE INDEX IF NOT EXISTS idx__fields ON _fields (table_name COLLATE NOCASE, field_name COLLATE NOCASE)";

    /// SQL for creating the diagram placement table
    pub const DIAGRAM: &'static str = r#"
        CREATE TABLE IF NOT EXISTS _diagram (
            table_name VARCHAR(30) COLLATE NOCASE PRIMARY KEY,
            rloc INTEGER NOT NULL,
            cloc INTEGER NOT NULL,
            description TEXT NOT NULL
        );
    "#;
}

/// A custom type entry from `_fields`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldOverride {
    /// Raw type name; parsed when the owning table is loaded
    pub type_name: String,
    pub description: Option<String>,
}

/// Position of a table on the diagram
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Placement {
    pub row: i64,
    pub column: i64,
    pub comment: String,
}

/// Reads and writes the metadata tables
pub struct SchemaManager<'a> {
    conn: &'a Connection,
}

impl<'a> SchemaManager<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Create the metadata tables if they are missing.
    pub fn initialize(&self) -> Result<()> {
        self.conn.execute(SchemaDefinitions::FIELDS, [])?;
        self.conn.execute(SchemaDefinitions::FIELDS_INDEX, [])?;
        self.conn.execute(SchemaDefinitions::DIAGRAM, [])?;
        Ok(())
    }

    /// Custom types for one table, keyed by lower-cased field name.
    pub fn field_overrides(&self, table: &str) -> Result<HashMap<String, FieldOverride>> {
        let mut stmt = self.conn.prepare(
            "SELECT field_name, field_type, description FROM _fields WHERE table_name = ?1 COLLATE NOCASE",
        )?;
        let overrides = stmt
            .query_map([table], |row| {
                Ok((
                    row.get::<_, String>(0)?.to_lowercase(),
                    FieldOverride {
                        type_name: row.get(1)?,
                        description: row.get(2)?,
                    },
                ))
            })?
            .collect::<rusqlite::Result<HashMap<_, _>>>()?;
        Ok(overrides)
    }

    pub fn placement(&self, table: &str) -> Result<Option<Placement>> {
        let placement = self
            .conn
            .query_row(
                "SELECT rloc, cloc, description FROM _diagram WHERE table_name = ?1 COLLATE NOCASE",
                [table],
                |row| {
                    Ok(Placement {
                        row: row.get(0)?,
                        column: row.get(1)?,
                        comment: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(placement)
    }

    /// Register a custom type (and optional description) for a field.
    pub fn set_field_type(
        &self,
        table: &str,
        field: &str,
        logical_type: LogicalType,
        description: Option<&str>,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO _fields (table_name, field_name, field_type, description) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![table, field, logical_type.name(), description],
        )?;
        Ok(())
    }

    pub fn set_placement(&self, table: &str, placement: &Placement) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO _diagram (table_name, rloc, cloc, description) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![table, placement.row, placement.column, placement.comment],
        )?;
        Ok(())
    }

    /// Remove every metadata row, leaving the tables in place.
    pub fn clear(&self) -> Result<()> {
        self.conn.execute("DELETE FROM _fields", [])?;
        self.conn.execute("DELETE FROM _diagram", [])?;
        Ok(())
    }
}
