//! Transaction scopes
//!
//! A [`TransactionScope`] rolls back on drop unless [`TransactionScope::commit`]
//! was called. A scope opened while another transaction is already active joins
//! it: nothing is issued on entry, commit, or rollback, and the outer scope keeps
//! control of the outcome.

use crate::error::Result;
use rusqlite::{Connection, Transaction};
use tracing::{debug, info};

pub struct TransactionScope<'a> {
    /// Present when this scope started the transaction and owns the outcome
    tx: Option<Transaction<'a>>,
}

impl<'a> TransactionScope<'a> {
    /// Begin a transaction, or join the one already in progress.
    pub fn begin(conn: &'a Connection) -> Result<Self> {
        let tx = if conn.is_autocommit() {
            let tx = conn.unchecked_transaction()?;
            debug!("transaction started");
            Some(tx)
        } else {
            None
        };
        Ok(Self { tx })
    }

    /// True if this scope started the transaction
    pub fn is_owner(&self) -> bool {
        self.tx.is_some()
    }

    /// Commit an owned transaction. If the commit fails, the transaction is
    /// rolled back.
    pub fn commit(mut self) -> Result<()> {
        if let Some(tx) = self.tx.take() {
            tx.commit()?;
            debug!("transaction committed");
        }
        Ok(())
    }

    /// Roll back now instead of waiting for the scope to end.
    pub fn rollback(mut self) -> Result<()> {
        if let Some(tx) = self.tx.take() {
            tx.rollback()?;
            info!("transaction rolled back");
        }
        Ok(())
    }
}

impl Drop for TransactionScope<'_> {
    fn drop(&mut self) {
        // the transaction itself rolls back when dropped
        if let Some(tx) = &self.tx {
            if !tx.is_autocommit() {
                info!("rolling back unfinished transaction");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE t (id INTEGER PRIMARY KEY)", [])
            .unwrap();
        conn
    }

    fn count(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_default_is_rollback() {
        let conn = create_test_db();
        {
            let scope = TransactionScope::begin(&conn).unwrap();
            assert!(scope.is_owner());
            conn.execute("INSERT INTO t (id) VALUES (1)", []).unwrap();
        }
        assert_eq!(count(&conn), 0);
        assert!(conn.is_autocommit());
    }

    #[test]
    fn test_commit() {
        let conn = create_test_db();
        let scope = TransactionScope::begin(&conn).unwrap();
        conn.execute("INSERT INTO t (id) VALUES (1)", []).unwrap();
        scope.commit().unwrap();
        assert_eq!(count(&conn), 1);
        assert!(conn.is_autocommit());
    }

    #[test]
    fn test_nested_scope_joins_outer() {
        let conn = create_test_db();
        let outer = TransactionScope::begin(&conn).unwrap();
        {
            let inner = TransactionScope::begin(&conn).unwrap();
            assert!(!inner.is_owner());
            conn.execute("INSERT INTO t (id) VALUES (1)", []).unwrap();
            inner.commit().unwrap();
        }
        assert!(!conn.is_autocommit());
        outer.rollback().unwrap();
        assert_eq!(count(&conn), 0);
    }

    #[test]
    fn test_failed_commit_rolls_back() {
        let conn = create_test_db();
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             CREATE TABLE child (id INTEGER PRIMARY KEY,
                 t_id INTEGER REFERENCES t (id) DEFERRABLE INITIALLY DEFERRED);",
        )
        .unwrap();
        let scope = TransactionScope::begin(&conn).unwrap();
        conn.execute("INSERT INTO t (id) VALUES (1)", []).unwrap();
        conn.execute("INSERT INTO child (id, t_id) VALUES (1, 99)", [])
            .unwrap();
        assert!(scope.commit().is_err());
        assert!(conn.is_autocommit());
        assert_eq!(count(&conn), 0);

        // the connection is usable for a fresh transaction
        let scope = TransactionScope::begin(&conn).unwrap();
        assert!(scope.is_owner());
        conn.execute("INSERT INTO t (id) VALUES (2)", []).unwrap();
        scope.commit().unwrap();
        assert_eq!(count(&conn), 1);
    }

    #[test]
    fn test_drop_after_statement_ended_transaction() {
        let conn = create_test_db();
        {
            let _scope = TransactionScope::begin(&conn).unwrap();
            conn.execute("INSERT INTO t (id) VALUES (1)", []).unwrap();
            conn.execute_batch("ROLLBACK").unwrap();
            assert!(conn.is_autocommit());
        }
        assert!(conn.is_autocommit());
        assert_eq!(count(&conn), 0);
    }
}
