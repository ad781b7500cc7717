//! Batched inserts and updates
//!
//! [`BatchUpdate`] is the engine shared by [`DbLoader`] and [`DbUpdate`]. It
//! owns one parameter holder per statement field, keyed by field name. Each
//! `submit` snapshots the current holder values into the pending batch; the
//! batch is executed once it reaches the flush threshold, and again when the
//! engine is closed or dropped. Holder values are not cleared between
//! submissions, so a field that is not set again keeps its previous value.

mod loader;
mod updater;

pub use loader::DbLoader;
pub use updater::DbUpdate;

use crate::database::table::Table;
use crate::database::DbConnection;
use crate::error::{ErdbError, Result};
use crate::types::{Payload, Value};
use rusqlite::Statement;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::{debug, warn};

pub struct BatchUpdate<'db> {
    db: &'db DbConnection,
    table: Rc<Table>,
    parms: Vec<Value>,
    /// Lower-cased field name to parameter slot
    slots: HashMap<String, usize>,
    stmt: Option<Statement<'db>>,
    pending: Vec<Vec<Value>>,
    batch_size: usize,
    flushes: usize,
    affected: usize,
}

impl<'db> BatchUpdate<'db> {
    pub fn new(db: &'db DbConnection, table: &str, batch_size: usize) -> Result<Self> {
        let table = db.get_table(table)?;
        Ok(BatchUpdate {
            db,
            parms: Vec::with_capacity(table.fields().len()),
            slots: HashMap::new(),
            table,
            stmt: None,
            pending: Vec::new(),
            batch_size: batch_size.max(1),
            flushes: 0,
            affected: 0,
        })
    }

    pub fn db(&self) -> &'db DbConnection {
        self.db
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    /// Allocate the next parameter slot for a field of the table.
    pub fn add_parm(&mut self, field: &str) -> Result<()> {
        let field = self.table.get_field(field)?;
        let key = field.name.to_lowercase();
        if self.slots.contains_key(&key) {
            return Err(ErdbError::schema(format!(
                "Field {} is used more than once in a statement on {}.",
                field.name,
                self.table.name()
            )));
        }
        self.slots.insert(key, self.parms.len());
        self.parms.push(field.logical_type.create());
        Ok(())
    }

    /// Prepare the statement whose marks match the allocated slots.
    pub fn prepare(&mut self, sql: &str) -> Result<()> {
        self.stmt = Some(self.db.prepare(sql)?);
        Ok(())
    }

    pub fn is_prepared(&self) -> bool {
        self.stmt.is_some()
    }

    fn slot(&mut self, field: &str) -> Result<&mut Value> {
        let idx = *self.slots.get(&field.to_lowercase()).ok_or_else(|| {
            ErdbError::schema(format!("Field {} does not exist in statement.", field))
        })?;
        Ok(&mut self.parms[idx])
    }

    pub fn set(&mut self, field: &str, value: impl Into<Payload>) -> Result<()> {
        self.slot(field)?.set(value)
    }

    pub fn set_null(&mut self, field: &str) -> Result<()> {
        self.slot(field)?.set_null();
        Ok(())
    }

    /// Add the current values to the batch, flushing if the batch is full.
    pub fn submit(&mut self) -> Result<()> {
        if self.stmt.is_none() {
            return Err(ErdbError::schema(format!(
                "No statement has been created for table {}.",
                self.table.name()
            )));
        }
        self.pending.push(self.parms.clone());
        if self.pending.len() >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    /// Execute the pending batch in one transaction. Returns the rows affected.
    pub fn flush(&mut self) -> Result<usize> {
        if self.pending.is_empty() {
            return Ok(0);
        }
        let Some(stmt) = self.stmt.as_mut() else {
            return Ok(0);
        };
        let rows = std::mem::take(&mut self.pending);
        let scope = self.db.transaction()?;
        let mut affected = 0;
        for row in &rows {
            for (idx, value) in row.iter().enumerate() {
                value.bind(stmt, idx + 1)?;
            }
            affected += stmt.raw_execute()?;
        }
        scope.commit()?;
        self.flushes += 1;
        self.affected += affected;
        debug!(
            "flushed batch of {} rows on {} ({} affected)",
            rows.len(),
            self.table.name(),
            affected
        );
        Ok(affected)
    }

    /// Number of batches executed so far
    pub fn flush_count(&self) -> usize {
        self.flushes
    }

    /// Rows submitted but not yet executed
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Total rows affected by executed batches
    pub fn affected(&self) -> usize {
        self.affected
    }

    /// Flush the remaining batch and release the statement. Returns the number
    /// of batches executed.
    pub fn close(mut self) -> Result<usize> {
        self.flush()?;
        self.stmt = None;
        Ok(self.flushes)
    }
}

impl Drop for BatchUpdate<'_> {
    fn drop(&mut self) {
        let pending = self.pending.len();
        if pending > 0 {
            if let Err(e) = self.flush() {
                warn!(
                    "failed to flush {} pending rows on {}: {}",
                    pending,
                    self.table.name(),
                    e
                );
            }
        }
    }
}
