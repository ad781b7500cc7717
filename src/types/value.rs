//! Typed value holders
//!
//! A [`Value`] is a mutable, nullable cell of one logical type. The same holders
//! are used as query parameters (bound into statements) and as record fields
//! (fetched from result rows).

use super::{Location, LogicalType};
use crate::error::{ErdbError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{Row, Statement, ToSql};

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// The payload of a holder, one variant per logical type.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Integer(i64),
    Real(f64),
    Text(String),
    ByteVector(Vec<f64>),
    Date(DateTime<Utc>),
    Boolean(bool),
    Location(Location),
}

impl Payload {
    /// Default payload for a holder of the given type
    pub fn default_for(logical_type: LogicalType) -> Payload {
        match logical_type {
            LogicalType::Integer => Payload::Integer(0),
            LogicalType::Real => Payload::Real(0.0),
            LogicalType::Text => Payload::Text(String::new()),
            LogicalType::ByteVector => Payload::ByteVector(Vec::new()),
            LogicalType::Date => Payload::Date(DateTime::<Utc>::default()),
            LogicalType::Boolean => Payload::Boolean(false),
            LogicalType::Location => Payload::Location(Location::default()),
        }
    }

    pub fn logical_type(&self) -> LogicalType {
        match self {
            Payload::Integer(_) => LogicalType::Integer,
            Payload::Real(_) => LogicalType::Real,
            Payload::Text(_) => LogicalType::Text,
            Payload::ByteVector(_) => LogicalType::ByteVector,
            Payload::Date(_) => LogicalType::Date,
            Payload::Boolean(_) => LogicalType::Boolean,
            Payload::Location(_) => LogicalType::Location,
        }
    }
}

impl From<i64> for Payload {
    fn from(v: i64) -> Self {
        Payload::Integer(v)
    }
}

impl From<i32> for Payload {
    fn from(v: i32) -> Self {
        Payload::Integer(v as i64)
    }
}

impl From<u32> for Payload {
    fn from(v: u32) -> Self {
        Payload::Integer(v as i64)
    }
}

impl From<f64> for Payload {
    fn from(v: f64) -> Self {
        Payload::Real(v)
    }
}

impl From<&str> for Payload {
    fn from(v: &str) -> Self {
        Payload::Text(v.to_string())
    }
}

impl From<String> for Payload {
    fn from(v: String) -> Self {
        Payload::Text(v)
    }
}

impl From<&String> for Payload {
    fn from(v: &String) -> Self {
        Payload::Text(v.clone())
    }
}

impl From<bool> for Payload {
    fn from(v: bool) -> Self {
        Payload::Boolean(v)
    }
}

impl From<Vec<f64>> for Payload {
    fn from(v: Vec<f64>) -> Self {
        Payload::ByteVector(v)
    }
}

impl From<&[f64]> for Payload {
    fn from(v: &[f64]) -> Self {
        Payload::ByteVector(v.to_vec())
    }
}

impl From<DateTime<Utc>> for Payload {
    fn from(v: DateTime<Utc>) -> Self {
        Payload::Date(v)
    }
}

impl From<NaiveDate> for Payload {
    fn from(v: NaiveDate) -> Self {
        Payload::Date(v.and_time(chrono::NaiveTime::MIN).and_utc())
    }
}

impl From<Location> for Payload {
    fn from(v: Location) -> Self {
        Payload::Location(v)
    }
}

/// A typed, nullable value cell.
///
/// Storing a value clears the null flag. Setting null keeps whatever payload was
/// there, but the payload is meaningless until a value is stored again.
#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    payload: Payload,
    null: bool,
}

impl Value {
    /// Create a default-valued, non-null holder.
    pub fn new(logical_type: LogicalType) -> Self {
        Value {
            payload: Payload::default_for(logical_type),
            null: false,
        }
    }

    pub fn logical_type(&self) -> LogicalType {
        self.payload.logical_type()
    }

    pub fn is_null(&self) -> bool {
        self.null
    }

    /// The current payload, or `None` if the holder is null
    pub fn payload(&self) -> Option<&Payload> {
        if self.null {
            None
        } else {
            Some(&self.payload)
        }
    }

    /// Store a value. The payload type must match the holder type.
    pub fn set(&mut self, value: impl Into<Payload>) -> Result<()> {
        let payload = value.into();
        if payload.logical_type() != self.logical_type() {
            return Err(ErdbError::type_mismatch(format!(
                "Cannot store a {} value in a {} holder.",
                payload.logical_type(),
                self.logical_type()
            )));
        }
        self.payload = payload;
        self.null = false;
        Ok(())
    }

    pub fn set_null(&mut self) {
        self.null = true;
    }

    /// Bind this value into a 1-based parameter slot of a prepared statement.
    pub fn bind(&self, stmt: &mut Statement<'_>, idx: usize) -> Result<()> {
        stmt.raw_bind_parameter(idx, self)?;
        Ok(())
    }

    /// Read this value from a 0-based result column.
    ///
    /// The raw column is read first and the null flag is derived from it
    /// afterwards; a null column resets the payload to the type default.
    pub fn fetch(&mut self, row: &Row<'_>, idx: usize) -> Result<()> {
        let raw = row.get_ref(idx)?;
        let logical_type = self.logical_type();
        let payload = match logical_type {
            LogicalType::Integer => read_integer(raw)?.map(Payload::Integer),
            LogicalType::Real => read_real(raw)?.map(Payload::Real),
            LogicalType::Text => read_text(raw)?.map(Payload::Text),
            LogicalType::ByteVector => read_blob(raw)?
                .map(|bytes| bytes_to_doubles(bytes).map(Payload::ByteVector))
                .transpose()?,
            LogicalType::Date => read_real(raw)?
                .map(|days| days_to_date(days).map(Payload::Date))
                .transpose()?,
            LogicalType::Boolean => read_integer(raw)?.map(|flag| Payload::Boolean(flag != 0)),
            LogicalType::Location => read_text(raw)?
                .map(|text| Location::decode(&text).map(Payload::Location))
                .transpose()?,
        };
        self.null = matches!(raw, ValueRef::Null);
        self.payload = payload.unwrap_or_else(|| Payload::default_for(logical_type));
        Ok(())
    }

    /// Value as an integer (lossy)
    pub fn as_int(&self) -> Result<i64> {
        match &self.payload {
            Payload::Integer(v) => Ok(*v),
            Payload::Real(v) => Ok(*v as i64),
            Payload::Text(v) => v.trim().parse().map_err(|_| {
                ErdbError::type_mismatch(format!("Cannot convert \"{}\" to an integer.", v))
            }),
            Payload::Date(v) => Ok(v.timestamp() / SECONDS_PER_DAY),
            Payload::Boolean(v) => Ok(*v as i64),
            Payload::ByteVector(_) | Payload::Location(_) => Err(self.refuse("an integer")),
        }
    }

    /// Value as a floating-point number (lossy)
    pub fn as_real(&self) -> Result<f64> {
        match &self.payload {
            Payload::Integer(v) => Ok(*v as f64),
            Payload::Real(v) => Ok(*v),
            Payload::Text(v) => v.trim().parse().map_err(|_| {
                ErdbError::type_mismatch(format!(
                    "Cannot convert \"{}\" to a floating-point number.",
                    v
                ))
            }),
            Payload::Date(v) => Ok(date_to_days(v)),
            Payload::Boolean(v) => Ok(if *v { 1.0 } else { 0.0 }),
            Payload::ByteVector(_) | Payload::Location(_) => {
                Err(self.refuse("a floating-point number"))
            }
        }
    }

    /// Value as text. Booleans render as "Y" or the empty string.
    pub fn as_text(&self) -> Result<String> {
        match &self.payload {
            Payload::Integer(v) => Ok(v.to_string()),
            Payload::Real(v) => Ok(v.to_string()),
            Payload::Text(v) => Ok(v.clone()),
            Payload::Date(v) => Ok(v.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)),
            Payload::Boolean(v) => Ok(if *v { "Y" } else { "" }.to_string()),
            Payload::Location(v) => Ok(v.to_string()),
            Payload::ByteVector(_) => Err(self.refuse("a string")),
        }
    }

    fn refuse(&self, target: &str) -> ErdbError {
        ErdbError::type_mismatch(format!(
            "Cannot represent a {} value as {}.",
            self.logical_type(),
            target
        ))
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        if self.null {
            return Ok(ToSqlOutput::from(rusqlite::types::Null));
        }
        let output = match &self.payload {
            Payload::Integer(v) => ToSqlOutput::from(*v),
            Payload::Real(v) => ToSqlOutput::from(*v),
            Payload::Text(v) => ToSqlOutput::from(v.as_str()),
            Payload::ByteVector(v) => ToSqlOutput::from(doubles_to_bytes(v)),
            Payload::Date(v) => ToSqlOutput::from(date_to_days(v)),
            Payload::Boolean(v) => ToSqlOutput::from(*v as i64),
            Payload::Location(v) => ToSqlOutput::from(
                v.encode()
                    .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?,
            ),
        };
        Ok(output)
    }
}

fn date_to_days(date: &DateTime<Utc>) -> f64 {
    date.timestamp() as f64 / SECONDS_PER_DAY as f64
}

fn days_to_date(days: f64) -> Result<DateTime<Utc>> {
    let seconds = (days * SECONDS_PER_DAY as f64).round() as i64;
    DateTime::from_timestamp(seconds, 0)
        .ok_or_else(|| ErdbError::type_mismatch(format!("Date value {} is out of range.", days)))
}

/// Pack a vector of doubles into big-endian bytes.
fn doubles_to_bytes(values: &[f64]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_be_bytes()).collect()
}

fn bytes_to_doubles(bytes: &[u8]) -> Result<Vec<f64>> {
    if bytes.len() % 8 != 0 {
        return Err(ErdbError::type_mismatch(format!(
            "Blob of {} bytes is not a vector of doubles.",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(8)
        .map(|chunk| {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(chunk);
            f64::from_be_bytes(buf)
        })
        .collect())
}

fn read_integer(raw: ValueRef<'_>) -> Result<Option<i64>> {
    match raw {
        ValueRef::Null => Ok(None),
        ValueRef::Integer(v) => Ok(Some(v)),
        ValueRef::Real(v) => Ok(Some(v as i64)),
        ValueRef::Text(t) => {
            let text = std::str::from_utf8(t).map_err(|e| ErdbError::type_mismatch(e.to_string()))?;
            text.trim().parse().map(Some).map_err(|_| {
                ErdbError::type_mismatch(format!("Column value \"{}\" is not an integer.", text))
            })
        }
        ValueRef::Blob(_) => Err(ErdbError::type_mismatch(
            "Cannot read a blob column as an integer.",
        )),
    }
}

fn read_real(raw: ValueRef<'_>) -> Result<Option<f64>> {
    match raw {
        ValueRef::Null => Ok(None),
        ValueRef::Integer(v) => Ok(Some(v as f64)),
        ValueRef::Real(v) => Ok(Some(v)),
        ValueRef::Text(t) => {
            let text = std::str::from_utf8(t).map_err(|e| ErdbError::type_mismatch(e.to_string()))?;
            text.trim().parse().map(Some).map_err(|_| {
                ErdbError::type_mismatch(format!("Column value \"{}\" is not a number.", text))
            })
        }
        ValueRef::Blob(_) => Err(ErdbError::type_mismatch(
            "Cannot read a blob column as a number.",
        )),
    }
}

fn read_text(raw: ValueRef<'_>) -> Result<Option<String>> {
    match raw {
        ValueRef::Null => Ok(None),
        ValueRef::Integer(v) => Ok(Some(v.to_string())),
        ValueRef::Real(v) => Ok(Some(v.to_string())),
        ValueRef::Text(t) => String::from_utf8(t.to_vec())
            .map(Some)
            .map_err(|e| ErdbError::type_mismatch(e.to_string())),
        ValueRef::Blob(_) => Err(ErdbError::type_mismatch(
            "Cannot read a blob column as text.",
        )),
    }
}

fn read_blob(raw: ValueRef<'_>) -> Result<Option<&[u8]>> {
    match raw {
        ValueRef::Null => Ok(None),
        ValueRef::Blob(b) => Ok(Some(b)),
        _ => Err(ErdbError::type_mismatch(
            "Expected a blob column for a vector field.",
        )),
    }
}
