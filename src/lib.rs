#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! erdb - entity-relationship access to SQLite databases
//!
//! erdb treats a SQLite schema as an entity-relationship diagram. Foreign keys
//! become links between tables, so a query names a path of tables and the
//! joins are derived from the links. Fields may carry a custom logical type
//! (dates, booleans, genome locations, numeric arrays) recorded in the
//! `_fields` metadata table.
//!
//! # Feature Flags
//!
//! | Feature | Description | Key Dependencies |
//! |---------|-------------|------------------|
//! | `parallel` | Fan result records out to a thread pool | `rayon` |
//! | `cli` | The `erdb` command-line binary | `clap`, `tracing-subscriber` |
//!
//! ```toml
//! # Library only
//! erdb = { version = "0.3", default-features = false }
//! ```
//!
//! # Architecture
//!
//! - **[`database`]**: connection, schema model, queries, loaders and updaters
//! - **[`types`]**: logical field types and typed value holders
//! - **[`config`]**: configuration management
//! - **[`error`]**: the [`ErdbError`] type
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use erdb::{DbConnection, Query, Relop};
//!
//! let db = DbConnection::open_path("genomes.sqlite3")?;
//! db.script_update("schema.sql")?;
//!
//! let mut query = Query::new(&db, "Genome Feature")?;
//! query
//!     .select("Genome", &["genome_name"])?
//!     .select("Feature", &["fig_id"])?
//!     .rel("Feature.seq_no", Relop::Le)?
//!     .set_parm(1, 100)?;
//! for record in query.iter()? {
//!     println!("{}", record?.to_json());
//! }
//! ```

pub mod config;
pub mod database;
pub mod error;
pub mod types;

pub use config::ErdbConfig;
pub use error::{ErdbError, Result};

pub use database::{DbConnection, DbLoader, DbUpdate, Query, Record, Records, Relop, Table};

pub use types::{Location, LogicalType, Payload, Value};
