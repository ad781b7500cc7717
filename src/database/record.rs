//! Query result records
//!
//! A [`Record`] holds one result row as typed value holders keyed by field spec
//! (`alias.field`). All records from one query share a [`RecordLayout`].

use crate::error::{ErdbError, Result};
use crate::types::{Location, LogicalType, Payload, Value};
use chrono::{DateTime, Utc};
use rusqlite::Row;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

/// Field specs and types of the columns in a result row
#[derive(Debug)]
pub struct RecordLayout {
    specs: Vec<String>,
    types: Vec<LogicalType>,
    /// Keyed by lower-cased spec
    index: HashMap<String, usize>,
}

impl RecordLayout {
    pub(crate) fn new(columns: Vec<(String, LogicalType)>) -> Self {
        let index = columns
            .iter()
            .enumerate()
            .map(|(i, (spec, _))| (spec.to_lowercase(), i))
            .collect();
        let (specs, types): (Vec<String>, Vec<LogicalType>) = columns.into_iter().unzip();
        RecordLayout {
            specs,
            types,
            index,
        }
    }

    pub fn specs(&self) -> &[String] {
        &self.specs
    }

    pub fn types(&self) -> &[LogicalType] {
        &self.types
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    fn position(&self, spec: &str) -> Result<usize> {
        self.index
            .get(&spec.to_lowercase())
            .copied()
            .ok_or_else(|| ErdbError::schema(format!("Field {} is not in this record.", spec)))
    }

    /// Marshal one result row into a record.
    pub(crate) fn read(self: &Arc<Self>, row: &Row<'_>) -> Result<Record> {
        let mut values = Vec::with_capacity(self.types.len());
        for (idx, logical_type) in self.types.iter().enumerate() {
            let mut value = logical_type.create();
            value.fetch(row, idx)?;
            values.push(value);
        }
        Ok(Record {
            layout: Arc::clone(self),
            values,
        })
    }
}

/// One row of query output.
#[derive(Debug, Clone)]
pub struct Record {
    layout: Arc<RecordLayout>,
    values: Vec<Value>,
}

impl Record {
    pub fn layout(&self) -> &RecordLayout {
        &self.layout
    }

    /// Field specs paired with their holders, in select order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.layout
            .specs
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    pub fn get_value(&self, spec: &str) -> Result<&Value> {
        let idx = self.layout.position(spec)?;
        Ok(&self.values[idx])
    }

    pub fn is_null(&self, spec: &str) -> Result<bool> {
        Ok(self.get_value(spec)?.is_null())
    }

    /// Field value as text, or `None` if the field is null.
    pub fn get_string(&self, spec: &str) -> Result<Option<String>> {
        let value = self.get_value(spec)?;
        if value.is_null() {
            Ok(None)
        } else {
            value.as_text().map(Some)
        }
    }

    /// Field value as text for display; null renders as an empty string.
    pub fn get_report_string(&self, spec: &str) -> Result<String> {
        Ok(self.get_string(spec)?.unwrap_or_default())
    }

    pub fn get_int(&self, spec: &str) -> Result<i64> {
        self.get_value(spec)?.as_int()
    }

    pub fn get_double(&self, spec: &str) -> Result<f64> {
        self.get_value(spec)?.as_real()
    }

    /// True if the field is not null and has a nonzero integer value.
    pub fn get_bool(&self, spec: &str) -> Result<bool> {
        let value = self.get_value(spec)?;
        Ok(!value.is_null() && value.as_int()? != 0)
    }

    pub fn get_date(&self, spec: &str) -> Result<Option<DateTime<Utc>>> {
        match self.typed(spec, LogicalType::Date)? {
            Some(Payload::Date(d)) => Ok(Some(*d)),
            _ => Ok(None),
        }
    }

    pub fn get_location(&self, spec: &str) -> Result<Option<Location>> {
        match self.typed(spec, LogicalType::Location)? {
            Some(Payload::Location(loc)) => Ok(Some(loc.clone())),
            _ => Ok(None),
        }
    }

    pub fn get_double_array(&self, spec: &str) -> Result<Option<Vec<f64>>> {
        match self.typed(spec, LogicalType::ByteVector)? {
            Some(Payload::ByteVector(v)) => Ok(Some(v.clone())),
            _ => Ok(None),
        }
    }

    fn typed(&self, spec: &str, expected: LogicalType) -> Result<Option<&Payload>> {
        let value = self.get_value(spec)?;
        if value.logical_type() != expected {
            return Err(ErdbError::type_mismatch(format!(
                "Field {} is {}, not {}.",
                spec,
                value.logical_type(),
                expected
            )));
        }
        Ok(value.payload())
    }

    /// Render the record as a JSON object keyed by field spec.
    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .fields()
            .map(|(spec, value)| {
                let json = match value.payload() {
                    None => serde_json::Value::Null,
                    Some(Payload::Integer(v)) => json!(v),
                    Some(Payload::Real(v)) => json!(v),
                    Some(Payload::Text(v)) => json!(v),
                    Some(Payload::ByteVector(v)) => json!(v),
                    Some(Payload::Date(v)) => json!(v.to_rfc3339()),
                    Some(Payload::Boolean(v)) => json!(v),
                    Some(Payload::Location(v)) => json!(v.to_string()),
                };
                (spec.to_string(), json)
            })
            .collect();
        serde_json::Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn read_one(sql: &str, columns: Vec<(String, LogicalType)>) -> Record {
        let conn = Connection::open_in_memory().unwrap();
        let layout = Arc::new(RecordLayout::new(columns));
        let mut stmt = conn.prepare(sql).unwrap();
        let mut rows = stmt.query([]).unwrap();
        let row = rows.next().unwrap().unwrap();
        layout.read(row).unwrap()
    }

    #[test]
    fn test_accessors() {
        let record = read_one(
            "SELECT 'abc', 42, NULL, 1, 2.0",
            vec![
                ("Genome.genome_id".to_string(), LogicalType::Text),
                ("Feature.seq_no".to_string(), LogicalType::Integer),
                ("Genome.genome_name".to_string(), LogicalType::Text),
                ("Genome.complete".to_string(), LogicalType::Boolean),
                ("Feature.created".to_string(), LogicalType::Date),
            ],
        );
        assert_eq!(
            record.get_string("genome.GENOME_ID").unwrap().as_deref(),
            Some("abc")
        );
        assert_eq!(record.get_int("Feature.seq_no").unwrap(), 42);
        assert_eq!(record.get_double("Feature.seq_no").unwrap(), 42.0);
        assert!(record.get_bool("Feature.seq_no").unwrap());
        assert!(record.is_null("Genome.genome_name").unwrap());
        assert_eq!(record.get_string("Genome.genome_name").unwrap(), None);
        assert_eq!(record.get_report_string("Genome.genome_name").unwrap(), "");
        assert!(record.get_bool("Genome.complete").unwrap());
        assert_eq!(record.get_report_string("Genome.complete").unwrap(), "Y");
        let date = record.get_date("Feature.created").unwrap().unwrap();
        assert_eq!(date.timestamp(), 2 * 86400);

        assert!(record.get_value("Genome.nothing").unwrap_err().is_schema());
        let err = record.get_location("Genome.genome_id").unwrap_err();
        assert!(matches!(err, ErdbError::Type(_)));
    }

    #[test]
    fn test_null_bool_is_false() {
        let record = read_one(
            "SELECT NULL",
            vec![("Genome.complete".to_string(), LogicalType::Integer)],
        );
        assert!(record.is_null("Genome.complete").unwrap());
        assert!(!record.get_bool("Genome.complete").unwrap());
    }

    #[test]
    fn test_to_json() {
        let record = read_one(
            "SELECT 'abc', NULL",
            vec![
                ("Genome.genome_id".to_string(), LogicalType::Text),
                ("Genome.genome_name".to_string(), LogicalType::Text),
            ],
        );
        assert_eq!(
            record.to_json(),
            json!({"Genome.genome_id": "abc", "Genome.genome_name": null})
        );
    }
}
