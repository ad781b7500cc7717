//! Catalog reader
//!
//! Answers the schema questions the table loader needs (columns, primary keys,
//! imported and exported foreign keys) from SQLite's catalog and table-valued
//! pragma functions.

use crate::error::Result;
use rusqlite::{Connection, OptionalExtension};
use tracing::warn;

/// One column as reported by `pragma_table_info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub declared_type: String,
    pub nullable: bool,
    /// 1-based position in the primary key, 0 if not part of it
    pub pk_position: i64,
}

/// One column pair of a foreign key. `key_seq` is 1-based; a key with more
/// than one column yields rows with `key_seq` greater than 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyColumn {
    pub key_seq: i64,
    pub pk_table: String,
    pub pk_column: String,
    pub fk_table: String,
    pub fk_column: String,
}

/// Read-only view of the database catalog
pub struct Catalog<'a> {
    conn: &'a Connection,
}

impl<'a> Catalog<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Names of all ordinary tables, including the underscore metadata tables.
    pub fn table_names(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(names)
    }

    /// Resolve a table name case-insensitively to its declared spelling.
    pub fn find_table(&self, name: &str) -> Result<Option<String>> {
        let found = self
            .conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
                [name],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(found)
    }

    pub fn columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        let mut stmt = self.conn.prepare(
            "SELECT name, type, \"notnull\", pk FROM pragma_table_info(?1) ORDER BY cid",
        )?;
        let columns = stmt
            .query_map([table], |row| {
                Ok(ColumnInfo {
                    name: row.get(0)?,
                    declared_type: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    nullable: row.get::<_, i64>(2)? == 0,
                    pk_position: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(columns)
    }

    /// Primary key columns in key order.
    pub fn primary_keys(&self, table: &str) -> Result<Vec<String>> {
        let mut keys: Vec<ColumnInfo> = self
            .columns(table)?
            .into_iter()
            .filter(|c| c.pk_position > 0)
            .collect();
        keys.sort_by_key(|c| c.pk_position);
        Ok(keys.into_iter().map(|c| c.name).collect())
    }

    /// Foreign keys declared by this table. Keys whose parent table does not
    /// exist, or whose implicit target cannot be matched to the parent's
    /// primary key, are skipped.
    pub fn imported_keys(&self, table: &str) -> Result<Vec<KeyColumn>> {
        let mut keys = Vec::new();
        for declared in self.declared_keys(table)? {
            if let Some(resolved) = self.resolve_key(table, declared)? {
                keys.extend(resolved);
            }
        }
        Ok(keys)
    }

    /// Foreign keys in other tables that reference this one.
    pub fn exported_keys(&self, table: &str) -> Result<Vec<KeyColumn>> {
        let mut keys = Vec::new();
        for other in self.table_names()? {
            for declared in self.declared_keys(&other)? {
                if !declared.parent.eq_ignore_ascii_case(table) {
                    continue;
                }
                if let Some(resolved) = self.resolve_key(&other, declared)? {
                    keys.extend(resolved);
                }
            }
        }
        Ok(keys)
    }

    /// Raw `pragma_foreign_key_list` rows grouped by constraint.
    fn declared_keys(&self, table: &str) -> Result<Vec<DeclaredKey>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, \"table\", \"from\", \"to\" FROM pragma_foreign_key_list(?1) ORDER BY id, seq",
        )?;
        let rows = stmt
            .query_map([table], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut declared: Vec<DeclaredKey> = Vec::new();
        for (id, parent, from, to) in rows {
            match declared.last_mut() {
                Some(key) if key.id == id => key.columns.push((from, to)),
                _ => declared.push(DeclaredKey {
                    id,
                    parent,
                    columns: vec![(from, to)],
                }),
            }
        }
        Ok(declared)
    }

    /// Resolve the parent table and target columns of one declared key.
    /// A key declared as `REFERENCES Parent` targets the parent's primary key.
    fn resolve_key(&self, table: &str, declared: DeclaredKey) -> Result<Option<Vec<KeyColumn>>> {
        let Some(pk_table) = self.find_table(&declared.parent)? else {
            warn!(
                "foreign key {} of table {} references missing table {}",
                declared.id, table, declared.parent
            );
            return Ok(None);
        };
        let parent_keys = if declared.columns.iter().any(|(_, to)| to.is_none()) {
            self.primary_keys(&pk_table)?
        } else {
            Vec::new()
        };
        let mut keys = Vec::with_capacity(declared.columns.len());
        for (seq, (from, to)) in declared.columns.into_iter().enumerate() {
            let pk_column = match to.or_else(|| parent_keys.get(seq).cloned()) {
                Some(column) => column,
                None => {
                    warn!(
                        "foreign key {} of table {} has no matching primary key in {}",
                        declared.id, table, pk_table
                    );
                    return Ok(None);
                }
            };
            keys.push(KeyColumn {
                key_seq: seq as i64 + 1,
                pk_table: pk_table.clone(),
                pk_column,
                fk_table: table.to_string(),
                fk_column: from,
            });
        }
        Ok(Some(keys))
    }
}

/// One foreign key constraint as declared, before its parent is resolved.
struct DeclaredKey {
    id: i64,
    parent: String,
    columns: Vec<(String, Option<String>)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE Genome (genome_id TEXT PRIMARY KEY, genome_name TEXT NOT NULL);
             CREATE TABLE Feature (fig_id TEXT PRIMARY KEY, genome_id TEXT REFERENCES Genome, seq_no INT);
             CREATE TABLE Pair (a TEXT, b TEXT, PRIMARY KEY (a, b));",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_columns() {
        let conn = create_test_db();
        let catalog = Catalog::new(&conn);
        let cols = catalog.columns("Genome").unwrap();
        assert_eq!(cols.len(), 2);
        assert_eq!(cols[0].name, "genome_id");
        assert_eq!(cols[0].pk_position, 1);
        assert!(!cols[1].nullable);
        assert!(catalog.columns("Missing").unwrap().is_empty());
    }

    #[test]
    fn test_keys() {
        let conn = create_test_db();
        let catalog = Catalog::new(&conn);
        assert_eq!(catalog.primary_keys("Pair").unwrap(), vec!["a", "b"]);

        let imported = catalog.imported_keys("Feature").unwrap();
        assert_eq!(imported.len(), 1);
        assert_eq!(imported[0].pk_table, "Genome");
        assert_eq!(imported[0].pk_column, "genome_id");
        assert_eq!(imported[0].fk_column, "genome_id");
        assert_eq!(imported[0].key_seq, 1);

        let exported = catalog.exported_keys("genome").unwrap();
        assert_eq!(exported.len(), 1);
        assert_eq!(exported[0].fk_table, "Feature");
    }

    #[test]
    fn test_dangling_references_are_skipped() {
        let conn = create_test_db();
        conn.execute_batch(
            "CREATE TABLE Orphan (id TEXT PRIMARY KEY, parent TEXT REFERENCES Missing, genome_id TEXT REFERENCES Genome);
             CREATE TABLE Keyless (v TEXT);
             CREATE TABLE Loose (id TEXT PRIMARY KEY, genome_id TEXT REFERENCES Genome (genome_id), v TEXT REFERENCES Keyless);",
        )
        .unwrap();
        let catalog = Catalog::new(&conn);

        let imported = catalog.imported_keys("Orphan").unwrap();
        assert_eq!(imported.len(), 1);
        assert_eq!(imported[0].pk_table, "Genome");

        // implicit reference to a table without a primary key
        let imported = catalog.imported_keys("Loose").unwrap();
        assert_eq!(imported.len(), 1);
        assert_eq!(imported[0].fk_column, "genome_id");
        assert!(catalog.exported_keys("Keyless").unwrap().is_empty());

        let exported = catalog.exported_keys("Genome").unwrap();
        let children: Vec<&str> = exported.iter().map(|k| k.fk_table.as_str()).collect();
        assert_eq!(children, vec!["Feature", "Loose", "Orphan"]);
        assert!(catalog.exported_keys("Missing").unwrap().is_empty());
    }

    #[test]
    fn test_composite_key_rows() {
        let conn = create_test_db();
        conn.execute_batch(
            "CREATE TABLE Link2 (x TEXT, y TEXT, FOREIGN KEY (x, y) REFERENCES Pair);
             CREATE TABLE Bad (x TEXT, y TEXT, FOREIGN KEY (x, y) REFERENCES Genome);",
        )
        .unwrap();
        let catalog = Catalog::new(&conn);
        let keys = catalog.imported_keys("Link2").unwrap();
        let seqs: Vec<i64> = keys.iter().map(|k| k.key_seq).collect();
        assert_eq!(seqs, vec![1, 2]);
        assert_eq!(keys[1].pk_column, "b");
        assert!(catalog.imported_keys("Bad").unwrap().is_empty());
    }

    #[test]
    fn test_find_table() {
        let conn = create_test_db();
        let catalog = Catalog::new(&conn);
        assert_eq!(
            catalog.find_table("FEATURE").unwrap().as_deref(),
            Some("Feature")
        );
        assert!(catalog.find_table("Nothing").unwrap().is_none());
        assert_eq!(
            catalog.table_names().unwrap(),
            vec!["Feature", "Genome", "Pair"]
        );
    }
}
