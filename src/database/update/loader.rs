//! Table loader
//!
//! Inserts rows into one table, setting fields by name. Every field of the table
//! is a parameter of the INSERT.

use super::BatchUpdate;
use crate::database::DbConnection;
use crate::error::Result;
use crate::types::Payload;

pub struct DbLoader<'db> {
    batch: BatchUpdate<'db>,
}

impl<'db> DbLoader<'db> {
    /// Create a loader with the connection's configured batch size.
    pub fn new(db: &'db DbConnection, table: &str) -> Result<Self> {
        Self::with_batch_size(db, table, db.batch_size())
    }

    pub fn with_batch_size(db: &'db DbConnection, table: &str, batch_size: usize) -> Result<Self> {
        let mut batch = BatchUpdate::new(db, table, batch_size)?;
        let fields: Vec<String> = batch.table().field_names().map(str::to_string).collect();
        let mut sql = db.buffer();
        sql.start("INSERT INTO ", batch.table().name())
            .append(" (")
            .add_fields(&fields)
            .append(") VALUES (")
            .add_mark_list(fields.len())
            .append(")");
        for field in &fields {
            batch.add_parm(field)?;
        }
        batch.prepare(sql.as_str())?;
        Ok(DbLoader { batch })
    }

    pub fn set(&mut self, field: &str, value: impl Into<Payload>) -> Result<&mut Self> {
        self.batch.set(field, value)?;
        Ok(self)
    }

    pub fn set_null(&mut self, field: &str) -> Result<&mut Self> {
        self.batch.set_null(field)?;
        Ok(self)
    }

    /// Queue the current field values as a new row.
    pub fn insert(&mut self) -> Result<()> {
        self.batch.submit()
    }

    pub fn flush_count(&self) -> usize {
        self.batch.flush_count()
    }

    /// Insert any queued rows and release the statement. Returns the number of
    /// batches executed over the loader's lifetime.
    pub fn close(self) -> Result<usize> {
        self.batch.close()
    }
}
