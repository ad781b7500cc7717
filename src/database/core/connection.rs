//! Database connection management
//!
//! [`DbConnection`] owns the SQLite session, the table metadata cache, and the
//! two metadata tables. Record primitives keyed by primary key, bulk script
//! ingestion, and the dependency-ordered drop of the whole schema live here.

use super::catalog::Catalog;
use super::dialect::{Dialect, SqliteDialect};
use super::schema::{SchemaManager, DIAGRAM_TABLE, FIELDS_TABLE};
use super::transaction::TransactionScope;
use crate::database::record::{Record, RecordLayout};
use crate::database::sql_buffer::SqlBuffer;
use crate::database::table::Table;
use crate::error::{ErdbError, Result};
use rusqlite::{Connection, Statement, ToSql};
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, info};

/// Default number of rows per insert or update batch
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Default number of keys per DELETE statement in [`DbConnection::delete_records`]
pub const DEFAULT_DELETE_BATCH_SIZE: usize = 100;

/// Connection to an erdb database
pub struct DbConnection {
    conn: Connection,
    dialect: Box<dyn Dialect>,
    /// Display name of the database (file path or ":memory:")
    location: String,
    /// Loaded tables keyed by lower-cased name
    tables: RefCell<HashMap<String, Rc<Table>>>,
    batch_size: usize,
    delete_batch_size: usize,
}

impl DbConnection {
    /// Open a database at the specified path
    ///
    /// If the path is `None`, an in-memory database is created. The metadata
    /// tables are created if they do not exist.
    pub fn open(path: Option<&str>) -> Result<Self> {
        let (conn, location) = match path {
            Some(p) => (Connection::open(p)?, p.to_string()),
            None => (Connection::open_in_memory()?, ":memory:".to_string()),
        };
        let db = DbConnection {
            conn,
            dialect: Box::new(SqliteDialect),
            location,
            tables: RefCell::new(HashMap::new()),
            batch_size: DEFAULT_BATCH_SIZE,
            delete_batch_size: DEFAULT_DELETE_BATCH_SIZE,
        };
        db.configure()?;
        SchemaManager::new(&db.conn).initialize()?;
        info!("opened {} database {}", db.dialect.name(), db.location);
        Ok(db)
    }

    pub fn open_path(path: &str) -> Result<Self> {
        Self::open(Some(path))
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::open(None)
    }

    /// Override the insert/update and delete batch sizes. Zero is treated as one.
    pub fn with_batch_sizes(mut self, batch_size: usize, delete_batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self.delete_batch_size = delete_batch_size.max(1);
        self
    }

    fn configure(&self) -> Result<()> {
        // In-memory databases answer "memory" here; that is fine.
        let _: String = self
            .conn
            .query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
        self.conn.execute_batch(
            "PRAGMA synchronous=NORMAL;
             PRAGMA cache_size=100000;
             PRAGMA temp_store=MEMORY;
             PRAGMA foreign_keys=ON;",
        )?;
        Ok(())
    }

    /// The underlying SQLite connection
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn delete_batch_size(&self) -> usize {
        self.delete_batch_size
    }

    /// Create an empty statement buffer for this connection's dialect.
    pub fn buffer(&self) -> SqlBuffer<'_> {
        SqlBuffer::new(self.dialect())
    }

    pub fn schema(&self) -> SchemaManager<'_> {
        SchemaManager::new(&self.conn)
    }

    /// Prepare a statement, logging its text.
    pub fn prepare(&self, sql: &str) -> Result<Statement<'_>> {
        debug!("preparing: {}", sql);
        Ok(self.conn.prepare(sql)?)
    }

    /// Execute a single statement without parameters.
    pub fn execute(&self, sql: &str) -> Result<usize> {
        debug!("executing: {}", sql);
        Ok(self.conn.execute(sql, [])?)
    }

    /// Begin a transaction scope. The scope rolls back unless committed.
    pub fn transaction(&self) -> Result<TransactionScope<'_>> {
        TransactionScope::begin(&self.conn)
    }

    /// Get a table's metadata, loading it on first use.
    pub fn get_table(&self, name: &str) -> Result<Rc<Table>> {
        self.find_table(name)?.ok_or_else(|| {
            ErdbError::schema(format!("Cannot find table \"{}\" in this database.", name))
        })
    }

    /// Get a table's metadata, or `None` if there is no such table.
    pub fn find_table(&self, name: &str) -> Result<Option<Rc<Table>>> {
        let key = name.to_lowercase();
        if let Some(table) = self.tables.borrow().get(&key) {
            return Ok(Some(Rc::clone(table)));
        }
        let Some(real_name) = Catalog::new(&self.conn).find_table(name)? else {
            return Ok(None);
        };
        let Some(table) = Table::load(&self.conn, self.dialect(), &real_name)? else {
            return Ok(None);
        };
        let table = Rc::new(table);
        self.tables.borrow_mut().insert(key, Rc::clone(&table));
        Ok(Some(table))
    }

    /// Forget every loaded table.
    pub fn clear_cache(&self) {
        self.tables.borrow_mut().clear();
    }

    /// Names of the user tables (metadata tables excluded).
    pub fn table_names(&self) -> Result<Vec<String>> {
        Ok(Catalog::new(&self.conn)
            .table_names()?
            .into_iter()
            .filter(|name| !name.starts_with('_'))
            .collect())
    }

    /// True if a record with the given primary key exists.
    pub fn check_for_record<K: ToSql>(&self, table: &str, key: K) -> Result<bool> {
        let table = self.get_table(table)?;
        let pk = table.require_primary_key("check-for-record")?;
        let mut sql = self.buffer();
        sql.append("SELECT COUNT(*) FROM ")
            .quote(table.name())
            .append(" WHERE ")
            .quote(pk)
            .append(" = ?");
        let mut stmt = self.prepare(sql.as_str())?;
        let count: i64 = stmt.query_row([&key as &dyn ToSql], |row| row.get(0))?;
        Ok(count > 0)
    }

    /// All primary key values of a table, as text.
    pub fn get_keys(&self, table: &str) -> Result<HashSet<String>> {
        let table = self.get_table(table)?;
        let pk = table.require_primary_key("get-keys")?;
        let field = table.get_field(pk)?;
        let mut sql = self.buffer();
        sql.append("SELECT ")
            .quote(pk)
            .append(" FROM ")
            .quote(table.name());
        let mut stmt = self.prepare(sql.as_str())?;
        let mut rows = stmt.query([])?;
        let mut keys = HashSet::new();
        while let Some(row) = rows.next()? {
            let mut value = field.logical_type.create();
            value.fetch(row, 0)?;
            keys.insert(value.as_text()?);
        }
        Ok(keys)
    }

    /// Read every field of the record with the given primary key.
    ///
    /// Record field specs are `Table.field`.
    pub fn get_record<K: ToSql>(&self, table: &str, key: K) -> Result<Option<Record>> {
        let table = self.get_table(table)?;
        let pk = table.require_primary_key("get-record")?;
        let layout = Arc::new(RecordLayout::new(
            table
                .fields()
                .iter()
                .map(|f| (format!("{}.{}", table.name(), f.name), f.logical_type))
                .collect(),
        ));
        let mut sql = self.buffer();
        sql.append("SELECT ")
            .add_fields(table.field_names())
            .append(" FROM ")
            .quote(table.name())
            .append(" WHERE ")
            .quote(pk)
            .append(" = ?");
        let mut stmt = self.prepare(sql.as_str())?;
        let mut rows = stmt.query([&key as &dyn ToSql])?;
        let record = match rows.next()? {
            Some(row) => Some(layout.read(row)?),
            None => None,
        };
        Ok(record)
    }

    /// Prepare `DELETE FROM table WHERE pk = ?`.
    pub fn build_delete_stmt(&self, table: &str) -> Result<Statement<'_>> {
        let table = self.get_table(table)?;
        let pk = table.require_primary_key("delete")?;
        let mut sql = self.buffer();
        sql.start("DELETE FROM ", table.name())
            .append(" WHERE ")
            .quote(pk)
            .append(" = ?");
        self.prepare(sql.as_str())
    }

    /// Delete the record with the given primary key. Returns the number of rows deleted.
    pub fn delete_record<K: ToSql>(&self, table: &str, key: K) -> Result<usize> {
        let mut stmt = self.build_delete_stmt(table)?;
        Ok(stmt.execute([&key as &dyn ToSql])?)
    }

    /// Delete every record whose primary key is in `keys`, in one transaction.
    ///
    /// Keys are sent in groups of [`DbConnection::delete_batch_size`].
    pub fn delete_records<K, I>(&self, table: &str, keys: I) -> Result<usize>
    where
        K: ToSql,
        I: IntoIterator<Item = K>,
    {
        let table = self.get_table(table)?;
        let pk = table.require_primary_key("delete")?.to_string();
        let keys: Vec<K> = keys.into_iter().collect();
        let scope = self.transaction()?;
        let mut deleted = 0;
        for chunk in keys.chunks(self.delete_batch_size) {
            let mut sql = self.buffer();
            sql.start("DELETE FROM ", table.name())
                .append(" WHERE ")
                .quote(&pk)
                .append(" IN (")
                .add_mark_list(chunk.len())
                .append(")");
            let mut stmt = self.prepare(sql.as_str())?;
            let params: Vec<&dyn ToSql> = chunk.iter().map(|k| k as &dyn ToSql).collect();
            deleted += stmt.execute(params.as_slice())?;
            debug!("deleted batch of {} keys from {}", chunk.len(), table.name());
        }
        scope.commit()?;
        info!("deleted {} records from {}", deleted, table.name());
        Ok(deleted)
    }

    /// Run a script file of semicolon-terminated statements in one transaction.
    pub fn script_update(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        info!("loading script {}", path.display());
        self.script_update_str(&text)
    }

    /// Run semicolon-terminated statements in one transaction.
    ///
    /// Each line is trimmed and appended to the current statement; a line ending
    /// in `;` completes it. A `;` anywhere else in a line is an error. Returns the
    /// number of statements executed.
    pub fn script_update_str(&self, script: &str) -> Result<usize> {
        let statements = split_script(script)?;
        let scope = self.transaction()?;
        for statement in &statements {
            debug!("script: {}", statement);
            self.conn.execute_batch(statement)?;
        }
        scope.commit()?;
        self.clear_cache();
        info!("executed {} script statements", statements.len());
        Ok(statements.len())
    }

    /// Drop every user table in foreign-key order and empty the metadata tables.
    ///
    /// A table is dropped only after every table importing its key is gone. The
    /// whole operation is one transaction; the table cache is cleared only after
    /// it commits. Returns the number of tables dropped.
    pub fn clear_tables(&self) -> Result<usize> {
        let catalog = Catalog::new(&self.conn);
        let names = self.table_names()?;
        // table -> tables that import its key
        let mut exports: HashMap<String, HashSet<String>> = HashMap::new();
        for name in &names {
            for key in catalog.imported_keys(name)? {
                let parent = key.pk_table.to_lowercase();
                let child = name.to_lowercase();
                if parent != child {
                    exports.entry(parent).or_default().insert(child);
                }
            }
        }
        let mut remaining: BTreeSet<String> = names.iter().map(|n| n.to_lowercase()).collect();
        let spelled: HashMap<String, &String> =
            names.iter().map(|n| (n.to_lowercase(), n)).collect();

        let scope = self.transaction()?;
        while !remaining.is_empty() {
            let next = remaining
                .iter()
                .find(|candidate| {
                    exports
                        .get(*candidate)
                        .map(|children| children.iter().all(|c| !remaining.contains(c)))
                        .unwrap_or(true)
                })
                .cloned();
            let Some(next) = next else {
                return Err(ErdbError::Integrity(
                    "Cannot drop all tables: circular references found.".to_string(),
                ));
            };
            let real_name = spelled.get(&next).map(|n| n.as_str()).unwrap_or(&next);
            let mut sql = self.buffer();
            sql.start("DROP TABLE ", real_name);
            self.execute(sql.as_str())?;
            info!("dropped table {}", real_name);
            remaining.remove(&next);
        }
        self.schema().clear()?;
        scope.commit()?;
        self.clear_cache();
        info!(
            "cleared {} tables and emptied {} and {}",
            names.len(),
            FIELDS_TABLE,
            DIAGRAM_TABLE
        );
        Ok(names.len())
    }

    /// Close the connection, reporting any error from the driver.
    pub fn close(self) -> Result<()> {
        let location = self.location.clone();
        self.conn.close().map_err(|(_, e)| ErdbError::Sql(e))?;
        info!("closed database {}", location);
        Ok(())
    }
}

/// Split a script into statements, one per `;`-terminated group of lines.
fn split_script(script: &str) -> Result<Vec<String>> {
    let mut statements = Vec::new();
    let mut current = String::new();
    for (num, line) in script.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(pos) = line.find(';') {
            if pos != line.len() - 1 {
                return Err(ErdbError::schema(format!(
                    "Script line {} has a semicolon before the end of the line.",
                    num + 1
                )));
            }
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(line);
        if line.ends_with(';') {
            statements.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        return Err(ErdbError::schema(
            "Script ends with a statement that has no terminating semicolon.",
        ));
    }
    Ok(statements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_fixtures::{fixture_db, GENOME_FEATURE_SCHEMA};
    use std::io::Write;

    #[test]
    fn test_open_in_memory() {
        let db = DbConnection::open_in_memory().unwrap();
        assert_eq!(db.location(), ":memory:");
        assert!(db.table_names().unwrap().is_empty());
        assert_eq!(db.batch_size(), DEFAULT_BATCH_SIZE);
        let catalog = Catalog::new(db.conn());
        assert!(catalog.find_table("_fields").unwrap().is_some());
        assert!(catalog.find_table("_diagram").unwrap().is_some());
    }

    #[test]
    fn test_open_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.sqlite3");
        let path = path.to_str().unwrap();
        {
            let db = DbConnection::open_path(path).unwrap();
            db.script_update_str(GENOME_FEATURE_SCHEMA).unwrap();
            db.close().unwrap();
        }
        let db = DbConnection::open_path(path).unwrap();
        assert_eq!(
            db.table_names().unwrap(),
            vec!["Contig", "Feature", "FeatureToGroup", "Genome"]
        );
    }

    #[test]
    fn test_get_table_cached() {
        let db = fixture_db();
        let a = db.get_table("Genome").unwrap();
        let b = db.get_table("GENOME").unwrap();
        assert!(Rc::ptr_eq(&a, &b));
        let err = db.get_table("Nowhere").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Schema error: Cannot find table \"Nowhere\" in this database."
        );
    }

    #[test]
    fn test_record_primitives() {
        let db = fixture_db();
        assert!(db.check_for_record("Genome", "83333.1").unwrap());
        assert!(!db.check_for_record("Genome", "100.1").unwrap());

        let keys = db.get_keys("Feature").unwrap();
        assert_eq!(keys.len(), 3);
        assert!(keys.contains("fig|83333.1.peg.1"));

        let record = db.get_record("Genome", "83333.1").unwrap().unwrap();
        assert_eq!(
            record.get_string("Genome.genome_name").unwrap().as_deref(),
            Some("Escherichia coli K-12")
        );
        assert!(db.get_record("Genome", "nope").unwrap().is_none());

        assert_eq!(db.delete_record("FeatureToGroup", "x").unwrap_err().to_string(),
            "Schema error: Cannot do delete on table FeatureToGroup, which has no primary key.");
        db.execute("DELETE FROM FeatureToGroup").unwrap();
        assert_eq!(db.delete_record("Feature", "fig|83333.1.peg.3").unwrap(), 1);
        assert!(!db.check_for_record("Feature", "fig|83333.1.peg.3").unwrap());
    }

    #[test]
    fn test_delete_records_in_batches() {
        let db = fixture_db().with_batch_sizes(10, 2);
        db.execute("DELETE FROM FeatureToGroup").unwrap();
        let deleted = db
            .delete_records(
                "Feature",
                ["fig|83333.1.peg.1", "fig|83333.1.peg.2", "fig|83333.1.peg.3", "missing"],
            )
            .unwrap();
        assert_eq!(deleted, 3);
        assert!(db.get_keys("Feature").unwrap().is_empty());
    }

    #[test]
    fn test_integer_keys() {
        let db = DbConnection::open_in_memory().unwrap();
        db.script_update_str(
            "CREATE TABLE Sample (id INTEGER PRIMARY KEY, label TEXT);
             INSERT INTO Sample (id, label) VALUES (1, 'a');
             INSERT INTO Sample (id, label) VALUES (2, 'b');",
        )
        .unwrap();
        assert!(db.check_for_record("Sample", 2).unwrap());
        let keys = db.get_keys("Sample").unwrap();
        assert!(keys.contains("1") && keys.contains("2"));
        assert_eq!(db.delete_records("Sample", [1, 2]).unwrap(), 2);
    }

    #[test]
    fn test_script_update() {
        let db = DbConnection::open_in_memory().unwrap();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "CREATE TABLE Genome (").unwrap();
        writeln!(file, "    genome_id TEXT PRIMARY KEY,").unwrap();
        writeln!(file, "    genome_name TEXT").unwrap();
        writeln!(file, ");").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "INSERT INTO Genome VALUES ('1.1', 'one');").unwrap();
        let count = db.script_update(file.path()).unwrap();
        assert_eq!(count, 2);
        assert!(db.check_for_record("Genome", "1.1").unwrap());
    }

    #[test]
    fn test_script_errors_roll_back() {
        let db = DbConnection::open_in_memory().unwrap();
        let err = db
            .script_update_str("CREATE TABLE A (x TEXT); CREATE TABLE B (y TEXT);")
            .unwrap_err();
        assert!(err.is_schema());
        assert!(db
            .script_update_str("CREATE TABLE A (x TEXT);\nCREATE TABLE B (y TEXT)")
            .unwrap_err()
            .is_schema());
        let err = db
            .script_update_str("CREATE TABLE A (x TEXT);\nINSERT INTO Missing VALUES (1);")
            .unwrap_err();
        assert!(matches!(err, ErdbError::Sql(_)));
        assert!(db.table_names().unwrap().is_empty());
    }

    #[test]
    fn test_clear_tables_chain() {
        let db = DbConnection::open_in_memory().unwrap();
        db.script_update_str(
            "CREATE TABLE C (c_id TEXT PRIMARY KEY);
             CREATE TABLE B (b_id TEXT PRIMARY KEY, c_id TEXT REFERENCES C);
             CREATE TABLE A (a_id TEXT PRIMARY KEY, b_id TEXT REFERENCES B);
             INSERT INTO C VALUES ('c');
             INSERT INTO B VALUES ('b', 'c');
             INSERT INTO A VALUES ('a', 'b');",
        )
        .unwrap();
        db.get_table("A").unwrap();
        assert_eq!(db.clear_tables().unwrap(), 3);
        assert!(db.table_names().unwrap().is_empty());
        assert!(db.find_table("A").unwrap().is_none());
    }

    #[test]
    fn test_dangling_reference_does_not_block_schema() {
        let db = DbConnection::open_in_memory().unwrap();
        db.script_update_str(
            "CREATE TABLE Genome (genome_id TEXT PRIMARY KEY);
             CREATE TABLE Feature (fig_id TEXT PRIMARY KEY, genome_id TEXT REFERENCES Genome);
             CREATE TABLE Orphan (id TEXT PRIMARY KEY, parent TEXT REFERENCES Missing);",
        )
        .unwrap();
        let genome = db.get_table("Genome").unwrap();
        assert!(genome.link("Feature").is_some());
        let orphan = db.get_table("Orphan").unwrap();
        assert!(orphan.links().next().is_none());
        assert_eq!(db.clear_tables().unwrap(), 3);
        assert!(db.table_names().unwrap().is_empty());
    }

    #[test]
    fn test_clear_tables_cycle() {
        let db = DbConnection::open_in_memory().unwrap();
        db.script_update_str(
            "CREATE TABLE A (a_id TEXT PRIMARY KEY, b_id TEXT REFERENCES B);
             CREATE TABLE B (b_id TEXT PRIMARY KEY, a_id TEXT REFERENCES A);
             CREATE TABLE Loner (id TEXT PRIMARY KEY, parent TEXT REFERENCES Loner);",
        )
        .unwrap();
        let err = db.clear_tables().unwrap_err();
        assert!(matches!(err, ErdbError::Integrity(_)));
        assert_eq!(db.table_names().unwrap(), vec!["A", "B", "Loner"]);
        assert!(db.conn().is_autocommit());
    }

    #[test]
    fn test_clear_tables_empties_metadata() {
        let db = fixture_db();
        db.schema()
            .set_field_type("Genome", "complete", crate::types::LogicalType::Boolean, None)
            .unwrap();
        assert_eq!(db.clear_tables().unwrap(), 4);
        assert!(db.schema().field_overrides("Genome").unwrap().is_empty());
        assert!(db.get_table("Genome").unwrap_err().is_schema());
    }
}
