//! Field updates
//!
//! Builds `UPDATE table SET f = ?, ... WHERE k = ? AND ...` from a set of fields
//! to change and a set of fields to filter on. Set the values of both kinds of
//! field by name, then call [`DbUpdate::update`] once per row.

use super::BatchUpdate;
use crate::database::DbConnection;
use crate::error::{ErdbError, Result};
use crate::types::Payload;
use std::collections::BTreeSet;

pub struct DbUpdate<'db> {
    batch: BatchUpdate<'db>,
    changes: BTreeSet<String>,
    filters: BTreeSet<String>,
}

impl<'db> DbUpdate<'db> {
    /// Updater that executes each row as soon as it is submitted.
    pub fn single(db: &'db DbConnection, table: &str) -> Result<Self> {
        Self::with_batch_size(db, table, 1)
    }

    /// Updater that batches rows using the connection's batch size.
    pub fn batch(db: &'db DbConnection, table: &str) -> Result<Self> {
        Self::with_batch_size(db, table, db.batch_size())
    }

    fn with_batch_size(db: &'db DbConnection, table: &str, batch_size: usize) -> Result<Self> {
        Ok(DbUpdate {
            batch: BatchUpdate::new(db, table, batch_size)?,
            changes: BTreeSet::new(),
            filters: BTreeSet::new(),
        })
    }

    fn field_names(&self, fields: &[&str]) -> Result<Vec<String>> {
        fields
            .iter()
            .map(|f| self.batch.table().get_field(f).map(|field| field.name.clone()))
            .collect()
    }

    /// Add fields to be changed.
    pub fn change(&mut self, fields: &[&str]) -> Result<&mut Self> {
        let names = self.field_names(fields)?;
        self.changes.extend(names);
        Ok(self)
    }

    /// Add fields that select the rows to change.
    pub fn filter(&mut self, fields: &[&str]) -> Result<&mut Self> {
        let names = self.field_names(fields)?;
        self.filters.extend(names);
        Ok(self)
    }

    /// Replace the filter fields with the table's primary key.
    pub fn primary_key(&mut self) -> Result<&mut Self> {
        let key = self
            .batch
            .table()
            .require_primary_key("primary-key filtering")?
            .to_string();
        self.filters.clear();
        self.filters.insert(key);
        Ok(self)
    }

    /// Build and prepare the statement. Parameters follow the statement: the
    /// changed fields, then the filter fields. On error the updater is left as
    /// it was, so the field sets can be corrected and the call retried.
    pub fn create_statement(&mut self) -> Result<&mut Self> {
        if self.batch.is_prepared() {
            return Err(ErdbError::schema(format!(
                "Update statement on {} was already created.",
                self.batch.table().name()
            )));
        }
        if self.changes.is_empty() {
            return Err(ErdbError::schema(format!(
                "Update on {} has no fields to change.",
                self.batch.table().name()
            )));
        }
        if let Some(field) = self.changes.intersection(&self.filters).next() {
            return Err(ErdbError::schema(format!(
                "Field {} cannot be both changed and filtered in an update on {}.",
                field,
                self.batch.table().name()
            )));
        }
        let db = self.batch.db();
        let mut sql = db.buffer();
        sql.start("UPDATE ", self.batch.table().name())
            .append(" SET ")
            .start_list(", ");
        for field in &self.changes {
            sql.append_delim().quote(field).append(" = ").append_mark();
        }
        if !self.filters.is_empty() {
            sql.append(" WHERE ").start_list(" AND ");
            for field in &self.filters {
                sql.append_delim().quote(field).append(" = ").append_mark();
            }
        }
        self.batch.prepare(sql.as_str())?;
        for field in self.changes.iter().chain(self.filters.iter()) {
            self.batch.add_parm(field)?;
        }
        Ok(self)
    }

    pub fn set(&mut self, field: &str, value: impl Into<Payload>) -> Result<&mut Self> {
        self.batch.set(field, value)?;
        Ok(self)
    }

    pub fn set_null(&mut self, field: &str) -> Result<&mut Self> {
        self.batch.set_null(field)?;
        Ok(self)
    }

    /// Submit an update with the current values.
    pub fn update(&mut self) -> Result<()> {
        if !self.batch.is_prepared() {
            return Err(ErdbError::schema(
                "Cannot do an update on an uncreated update statement.",
            ));
        }
        self.batch.submit()
    }

    /// Execute any queued updates and release the statement. Returns the number
    /// of rows changed.
    pub fn close(self) -> Result<usize> {
        let mut batch = self.batch;
        batch.flush()?;
        let affected = batch.affected();
        batch.close()?;
        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_fixtures::fixture_db;

    #[test]
    fn test_single_update() {
        let db = fixture_db();
        let mut update = DbUpdate::single(&db, "Genome").unwrap();
        update
            .change(&["genome_name", "domain"])
            .unwrap()
            .primary_key()
            .unwrap()
            .create_statement()
            .unwrap();
        update
            .set("genome_name", "E. coli")
            .unwrap()
            .set("domain", "Bacteria")
            .unwrap()
            .set("genome_id", "511145.12")
            .unwrap();
        update.update().unwrap();
        let record = db.get_record("Genome", "511145.12").unwrap().unwrap();
        assert_eq!(record.get_report_string("Genome.genome_name").unwrap(), "E. coli");
        assert_eq!(record.get_report_string("Genome.domain").unwrap(), "Bacteria");
        assert_eq!(update.close().unwrap(), 1);
    }

    #[test]
    fn test_batch_update_with_filter() {
        let db = fixture_db();
        let mut update = DbUpdate::batch(&db, "Feature").unwrap();
        update
            .change(&["seq_no"])
            .unwrap()
            .filter(&["fig_id", "genome_id"])
            .unwrap()
            .create_statement()
            .unwrap();
        update.set("genome_id", "83333.1").unwrap();
        for (fid, seq) in [("fig|83333.1.peg.1", 10), ("fig|83333.1.peg.2", 20)] {
            update.set("fig_id", fid).unwrap().set("seq_no", seq).unwrap();
            update.update().unwrap();
        }
        assert_eq!(update.close().unwrap(), 2);
        let record = db.get_record("Feature", "fig|83333.1.peg.2").unwrap().unwrap();
        assert_eq!(record.get_int("Feature.seq_no").unwrap(), 20);
    }

    #[test]
    fn test_update_errors() {
        let db = fixture_db();
        let mut update = DbUpdate::single(&db, "FeatureToGroup").unwrap();
        let err = update.primary_key().err().unwrap();
        assert_eq!(
            err.to_string(),
            "Schema error: Cannot do primary-key filtering on table FeatureToGroup, which has no primary key."
        );
        assert!(update.change(&["nothing"]).err().unwrap().is_schema());
        assert!(update.update().unwrap_err().is_schema());
        assert!(update.create_statement().err().unwrap().is_schema());

        let mut update = DbUpdate::single(&db, "Genome").unwrap();
        update
            .change(&["genome_name"])
            .unwrap()
            .filter(&["genome_name"])
            .unwrap();
        assert!(update.create_statement().err().unwrap().is_schema());
    }

    #[test]
    fn test_overlap_then_retry() {
        let db = fixture_db();
        let mut update = DbUpdate::single(&db, "Genome").unwrap();
        update
            .change(&["genome_name", "domain"])
            .unwrap()
            .filter(&["domain"])
            .unwrap();
        let err = update.create_statement().err().unwrap();
        assert!(err.to_string().contains("domain"));
        assert!(!update.batch.is_prepared());
        assert!(update.set("genome_name", "x").is_err());

        // switch the filter to the key; the earlier failure left no slots behind
        update.primary_key().unwrap().create_statement().unwrap();
        update
            .set("genome_name", "Renamed")
            .unwrap()
            .set("domain", "Archaea")
            .unwrap()
            .set("genome_id", "511145.12")
            .unwrap();
        update.update().unwrap();
        assert!(update.create_statement().err().unwrap().is_schema());
        assert_eq!(update.close().unwrap(), 1);

        let record = db.get_record("Genome", "511145.12").unwrap().unwrap();
        assert_eq!(record.get_report_string("Genome.domain").unwrap(), "Archaea");
    }
}
