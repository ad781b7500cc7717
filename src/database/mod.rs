//! Database module
//!
//! Entity-relationship access over SQLite, organized into:
//!
//! - **core**: connection, catalog reader, dialect, metadata tables, transactions
//! - **table**: table descriptors loaded from the catalog and the `_fields` overrides
//! - **query**: path-based multi-table queries and their lazy result sequences
//! - **record**: result rows with typed getters by `Table.field` spec
//! - **update**: batched loaders and field updaters
//!
//! # Architecture
//!
//! ```text
//! database/
//! ├── core/           # Foundation
//! │   ├── connection  # DbConnection: session, table cache, record primitives
//! │   ├── catalog     # PRAGMA-based schema questions
//! │   ├── dialect     # quoting and native type parsing
//! │   ├── schema      # _fields and _diagram metadata tables
//! │   └── transaction # join-or-begin transaction scope
//! │
//! ├── query/          # Reads
//! │   ├── path        # "Genome Feature < Contig" path parsing
//! │   ├── records     # lazy result sequence
//! │   └── collect     # map/set collectors keyed by one field
//! │
//! └── update/         # Writes
//!     ├── loader      # batched INSERT of whole rows
//!     └── updater     # batched UPDATE of selected fields
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use erdb::database::{DbConnection, DbLoader, Query, Relop};
//!
//! let db = DbConnection::open_path("genomes.sqlite3")?;
//!
//! let mut loader = DbLoader::new(&db, "Genome")?;
//! loader.set("genome_id", "83333.1")?.set("genome_name", "Escherichia coli K-12")?;
//! loader.insert()?;
//! loader.close()?;
//!
//! let mut query = Query::new(&db, "Genome Feature")?;
//! query
//!     .select("Feature", &["fig_id", "seq_no"])?
//!     .rel("Genome.genome_id", Relop::Eq)?
//!     .order_by("Feature.seq_no")?
//!     .set_parm(1, "83333.1")?;
//! for record in query.iter()? {
//!     let record = record?;
//!     println!("{}", record.get_report_string("Feature.fig_id")?);
//! }
//! ```

pub mod core;
pub mod query;
pub mod record;
pub mod sql_buffer;
pub mod table;
pub mod update;

#[cfg(test)]
pub(crate) mod test_fixtures;

// Connection and schema management
pub use core::{
    Catalog, DbConnection, Dialect, FieldOverride, Placement, SchemaDefinitions, SchemaManager,
    SqliteDialect, TransactionScope, DEFAULT_BATCH_SIZE, DEFAULT_DELETE_BATCH_SIZE,
};

// Queries and results
pub use query::collect::{collect_map, collect_set};
pub use query::{Query, Records, Relop};
pub use record::{Record, RecordLayout};

// Schema model
pub use sql_buffer::SqlBuffer;
pub use table::{Field, Link, Table};

// Writers
pub use update::{BatchUpdate, DbLoader, DbUpdate};
