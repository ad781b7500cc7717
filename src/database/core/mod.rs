//! Core database infrastructure
//!
//! - `DbConnection`: SQLite session, table cache, record primitives, drop-all
//! - `Catalog`: schema questions answered from SQLite's catalog
//! - `Dialect`: engine adapter (quoting, native type parsing)
//! - `SchemaManager`: the `_fields` and `_diagram` metadata tables
//! - `TransactionScope`: rollback-by-default transaction boundary

mod catalog;
mod connection;
mod dialect;
mod schema;
mod transaction;

pub use catalog::{Catalog, ColumnInfo, KeyColumn};
pub use connection::{DbConnection, DEFAULT_BATCH_SIZE, DEFAULT_DELETE_BATCH_SIZE};
pub use dialect::{Dialect, SqliteDialect};
pub use schema::{
    FieldOverride, Placement, SchemaDefinitions, SchemaManager, DIAGRAM_TABLE, FIELDS_TABLE,
};
pub use transaction::TransactionScope;
