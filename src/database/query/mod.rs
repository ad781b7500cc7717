//! Path-based query builder
//!
//! A [`Query`] is created from a join path (see [`path`]) and then given fields
//! to select, filters, and sort keys through a fluent interface. Filters allocate
//! parameter holders in the order they are added; values are stored later with
//! [`Query::set_parm`] using 1-based positions. The statement is prepared on the
//! first call to [`Query::iter`] and reused for later executions with new
//! parameter values.
//!
//! ```rust,ignore
//! let mut query = Query::new(&db, "Genome1 Feature2")?;
//! query
//!     .select("Genome1", &["genome_name"])?
//!     .select("Feature2", &["fig_id", "seq_no"])?
//!     .rel("Genome1.genome_id", Relop::Eq)?
//!     .order_by("Feature2.seq_no")?;
//! query.set_parm(1, "83333.1")?;
//! for record in query.iter()? {
//!     let record = record?;
//!     println!("{}", record.get_report_string("Feature2.fig_id")?);
//! }
//! ```

pub mod collect;
pub mod path;
mod records;

pub use records::Records;

use crate::database::record::RecordLayout;
use crate::database::table::{Field, Table};
use crate::database::DbConnection;
use crate::error::{ErdbError, Result};
use crate::types::{LogicalType, Payload, Value};
use path::{parse_path, table_name, JoinKind};
use rusqlite::Statement;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;
use std::sync::Arc;

/// Relational operators for [`Query::rel`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relop {
    Eq,
    Ge,
    Gt,
    Le,
    Lt,
    Ne,
}

impl Relop {
    /// Operator text with surrounding spaces
    pub fn sql(&self) -> &'static str {
        match self {
            Relop::Eq => " = ",
            Relop::Ge => " >= ",
            Relop::Gt => " > ",
            Relop::Le => " <= ",
            Relop::Lt => " < ",
            Relop::Ne => " != ",
        }
    }
}

impl fmt::Display for Relop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql().trim())
    }
}

impl FromStr for Relop {
    type Err = ErdbError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "=" | "==" => Ok(Relop::Eq),
            ">=" => Ok(Relop::Ge),
            ">" => Ok(Relop::Gt),
            "<=" => Ok(Relop::Le),
            "<" => Ok(Relop::Lt),
            "!=" | "<>" => Ok(Relop::Ne),
            _ => Err(ErdbError::schema(format!(
                "Invalid relational operator \"{}\".",
                s
            ))),
        }
    }
}

/// A table reference in the query path
#[derive(Debug, Clone)]
struct Alias {
    name: String,
    table: Rc<Table>,
}

pub struct Query<'db> {
    db: &'db DbConnection,
    /// Keyed by lower-cased alias
    aliases: HashMap<String, Alias>,
    from: String,
    columns: Vec<(String, LogicalType)>,
    /// Lower-cased specs of the selected fields
    selected: HashSet<String>,
    filters: Vec<String>,
    order: Vec<String>,
    parms: Vec<Value>,
    layout: Option<Arc<RecordLayout>>,
    stmt: Option<Statement<'db>>,
}

impl fmt::Debug for Query<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("from", &self.from)
            .field("columns", &self.columns)
            .field("filters", &self.filters)
            .field("order", &self.order)
            .finish_non_exhaustive()
    }
}

impl<'db> Query<'db> {
    /// Create a query over the tables named in a join path.
    pub fn new(db: &'db DbConnection, path: &str) -> Result<Self> {
        let mut query = Query {
            db,
            aliases: HashMap::new(),
            from: String::new(),
            columns: Vec::new(),
            selected: HashSet::new(),
            filters: Vec::new(),
            order: Vec::new(),
            parms: Vec::new(),
            layout: None,
            stmt: None,
        };
        query.parse(path)?;
        Ok(query)
    }

    fn parse(&mut self, path: &str) -> Result<()> {
        let db = self.db;
        let mut from = db.buffer();
        let mut anchor: Option<Alias> = None;
        for step in parse_path(path)? {
            let alias = Alias {
                table: self.find_table(&step.spec)?,
                name: step.spec,
            };
            let key = alias.name.to_lowercase();
            match (step.join, anchor.as_ref()) {
                (Some(JoinKind::Reset), _) => {
                    if !self.aliases.contains_key(&key) {
                        return Err(ErdbError::schema(format!(
                            "Table {} after \"&\" must already appear in the path.",
                            alias.name
                        )));
                    }
                }
                (join, previous) => {
                    if self.aliases.contains_key(&key) {
                        return Err(ErdbError::schema(format!(
                            "Table {} appears more than once in the path.",
                            alias.name
                        )));
                    }
                    if let Some(kind) = join {
                        from.append(kind.sql());
                    }
                    from.quote(alias.table.name());
                    if alias.table.name() != alias.name {
                        from.append(" AS ").quote(&alias.name);
                    }
                    if let Some(previous) = previous {
                        let link = previous.table.link(alias.table.name()).ok_or_else(|| {
                            ErdbError::schema(format!(
                                "No path from {} to {}.",
                                previous.name, alias.name
                            ))
                        })?;
                        from.append(" ON ");
                        link.store(&mut from, &previous.name, &alias.name);
                    }
                    self.aliases.insert(key, alias.clone());
                }
            }
            anchor = Some(alias);
        }
        self.from = from.into_string();
        Ok(())
    }

    /// Resolve a table spec from the path to its table.
    fn find_table(&self, spec: &str) -> Result<Rc<Table>> {
        let name = table_name(spec)?;
        if name.len() != spec.len() && self.db.find_table(spec)?.is_some() {
            return Err(ErdbError::schema(format!(
                "Ambiguous table spec {}: it names a table and also an alias of {}.",
                spec, name
            )));
        }
        self.db.get_table(name)
    }

    /// Resolve `alias.field` to its canonical spec and field.
    fn resolve(&self, spec: &str) -> Result<(String, Field)> {
        let (alias, field) = spec.split_once('.').ok_or_else(|| {
            ErdbError::schema(format!(
                "Invalid field specification \"{}\": expected table.field.",
                spec
            ))
        })?;
        let alias = self.alias(alias)?;
        let field = alias.table.get_field(field)?;
        Ok((format!("{}.{}", alias.name, field.name), field.clone()))
    }

    fn alias(&self, name: &str) -> Result<&Alias> {
        self.aliases.get(&name.to_lowercase()).ok_or_else(|| {
            ErdbError::schema(format!("Table {} is not in this query.", name))
        })
    }

    fn comparable(&self, spec: &str) -> Result<(String, Field)> {
        let (spec, field) = self.resolve(spec)?;
        if !field.logical_type.is_comparable() {
            return Err(ErdbError::type_mismatch(format!(
                "Field {} cannot be used for sorting or filtering.",
                spec
            )));
        }
        Ok((spec, field))
    }

    /// Drop the prepared statement after the query text changes.
    fn invalidate(&mut self) {
        self.stmt = None;
        self.layout = None;
    }

    fn add_column(&mut self, spec: String, logical_type: LogicalType) {
        if self.selected.insert(spec.to_lowercase()) {
            self.columns.push((spec, logical_type));
        }
    }

    /// Add fields of one table to the output. Fields already selected are skipped.
    /// If any field fails to resolve, the query is left unchanged.
    pub fn select(&mut self, alias: &str, fields: &[&str]) -> Result<&mut Self> {
        let resolved = fields
            .iter()
            .map(|field| self.resolve(&format!("{}.{}", alias, field)))
            .collect::<Result<Vec<_>>>()?;
        for (spec, field) in resolved {
            self.add_column(spec, field.logical_type);
        }
        self.invalidate();
        Ok(self)
    }

    /// Add every field of one table to the output.
    pub fn select_all(&mut self, alias: &str) -> Result<&mut Self> {
        let alias = self.alias(alias)?.clone();
        for field in alias.table.fields() {
            self.add_column(format!("{}.{}", alias.name, field.name), field.logical_type);
        }
        self.invalidate();
        Ok(self)
    }

    /// Sort the output by a field, ascending.
    pub fn order_by(&mut self, spec: &str) -> Result<&mut Self> {
        self.add_order(spec, "")
    }

    pub fn order_by_desc(&mut self, spec: &str) -> Result<&mut Self> {
        self.add_order(spec, " DESC")
    }

    fn add_order(&mut self, spec: &str, direction: &str) -> Result<&mut Self> {
        let (spec, _) = self.comparable(spec)?;
        let mut sql = self.db.buffer();
        sql.quote_spec(&spec).append(direction);
        self.order.push(sql.into_string());
        self.invalidate();
        Ok(self)
    }

    /// Filter on `field <op> ?`. Allocates one parameter.
    pub fn rel(&mut self, spec: &str, op: Relop) -> Result<&mut Self> {
        let (spec, field) = self.comparable(spec)?;
        let mut sql = self.db.buffer();
        sql.quote_spec(&spec).append(op.sql()).append_mark();
        self.add_filter(sql.into_string(), field.logical_type, 1)
    }

    /// Filter on `field BETWEEN ? AND ?`. Allocates two parameters.
    pub fn between(&mut self, spec: &str) -> Result<&mut Self> {
        let (spec, field) = self.comparable(spec)?;
        let mut sql = self.db.buffer();
        sql.quote_spec(&spec)
            .append(" BETWEEN ")
            .append_mark()
            .append(" AND ")
            .append_mark();
        self.add_filter(sql.into_string(), field.logical_type, 2)
    }

    /// Filter on `field IN (?, ...)`. Allocates `count` parameters.
    pub fn in_list(&mut self, spec: &str, count: usize) -> Result<&mut Self> {
        let (spec, field) = self.comparable(spec)?;
        if count == 0 {
            return Err(ErdbError::parameter(format!(
                "IN list for {} needs at least one value.",
                spec
            )));
        }
        let mut sql = self.db.buffer();
        sql.quote_spec(&spec)
            .append(" IN (")
            .add_mark_list(count)
            .append(")");
        self.add_filter(sql.into_string(), field.logical_type, count)
    }

    /// Filter on `field IS NULL` (or `IS NOT NULL`). The field must be nullable.
    pub fn is_null(&mut self, spec: &str, null: bool) -> Result<&mut Self> {
        let (spec, field) = self.resolve(spec)?;
        if !field.nullable {
            return Err(ErdbError::schema(format!(
                "Field {} is not nullable.",
                spec
            )));
        }
        let mut sql = self.db.buffer();
        sql.quote_spec(&spec)
            .append(if null { " IS NULL" } else { " IS NOT NULL" });
        self.add_filter(sql.into_string(), field.logical_type, 0)
    }

    fn add_filter(
        &mut self,
        clause: String,
        logical_type: LogicalType,
        parms: usize,
    ) -> Result<&mut Self> {
        self.filters.push(clause);
        self.parms
            .extend(std::iter::repeat_with(|| logical_type.create()).take(parms));
        self.invalidate();
        Ok(self)
    }

    /// Number of parameter holders allocated so far
    pub fn parm_count(&self) -> usize {
        self.parms.len()
    }

    fn check_slots(&self, position: usize, count: usize) -> Result<()> {
        if position < 1 || position - 1 + count > self.parms.len() {
            return Err(ErdbError::parameter(format!(
                "Attempt to store {} parameters at position {} but only {} slots available.",
                count,
                position,
                self.parms.len()
            )));
        }
        Ok(())
    }

    /// Store a value in the 1-based parameter slot.
    pub fn set_parm(&mut self, position: usize, value: impl Into<Payload>) -> Result<&mut Self> {
        self.check_slots(position, 1)?;
        self.parms[position - 1].set(value)?;
        Ok(self)
    }

    /// Store values in consecutive parameter slots starting at `position`.
    pub fn set_parms<I, V>(&mut self, position: usize, values: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Payload>,
    {
        let values: Vec<Payload> = values.into_iter().map(Into::into).collect();
        self.check_slots(position, values.len())?;
        for (offset, value) in values.into_iter().enumerate() {
            self.parms[position - 1 + offset].set(value)?;
        }
        Ok(self)
    }

    pub fn set_parm_null(&mut self, position: usize) -> Result<&mut Self> {
        self.check_slots(position, 1)?;
        self.parms[position - 1].set_null();
        Ok(self)
    }

    /// Selected field specs, in output order
    pub fn field_specs(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(spec, _)| spec.as_str())
    }

    /// The statement text this query executes.
    pub fn sql(&self) -> Result<String> {
        if self.columns.is_empty() {
            return Err(ErdbError::schema("Query does not have fields to select."));
        }
        let mut sql = self.db.buffer();
        sql.append("SELECT ").start_list(", ");
        for (spec, _) in &self.columns {
            sql.append_delim().quote_spec(spec);
        }
        sql.append(" FROM ").append(&self.from);
        if !self.filters.is_empty() {
            sql.append(" WHERE ").append(&self.filters.join(" AND "));
        }
        if !self.order.is_empty() {
            sql.append(" ORDER BY ").append(&self.order.join(", "));
        }
        Ok(sql.into_string())
    }

    fn compile(&mut self) -> Result<()> {
        if self.stmt.is_none() {
            let sql = self.sql()?;
            self.stmt = Some(self.db.prepare(&sql)?);
            self.layout = Some(Arc::new(RecordLayout::new(self.columns.clone())));
        }
        Ok(())
    }

    /// Execute the query with the current parameter values.
    ///
    /// The returned sequence borrows the query, so it must be finished or
    /// dropped before the query is executed again.
    pub fn iter(&mut self) -> Result<Records<'_>> {
        self.compile()?;
        let Query {
            stmt, parms, layout, ..
        } = self;
        let (Some(stmt), Some(layout)) = (stmt.as_mut(), layout.as_ref()) else {
            return Err(ErdbError::schema("Query statement was not prepared."));
        };
        for (idx, parm) in parms.iter().enumerate() {
            parm.bind(stmt, idx + 1)?;
        }
        Ok(Records::new(stmt.raw_query(), Arc::clone(layout)))
    }
}
