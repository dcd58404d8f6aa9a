//! SQLite backend

use std::path::Path;
use rusqlite::{params_from_iter, Connection, OpenFlags};
use crate::Result;
use super::backend::{Backend, QueryRows};
use super::{schema, Dialect, SqlValue};

/// SQLite-backed connection
pub struct SqliteBackend {
    conn: Connection,
}

impl SqliteBackend {
    /// Open a database file for loading (creates if doesn't exist)
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let _mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Self::with_connection(conn)
    }

    /// Open an existing database file that refuses writes
    pub fn open_read_only(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX | OpenFlags::SQLITE_OPEN_URI,
        )?;
        conn.pragma_update(None, "query_only", "ON")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        for pragma in schema::connection_pragmas(Dialect::Sqlite) {
            conn.execute_batch(pragma)?;
        }
        Ok(Self { conn })
    }
}

impl Backend for SqliteBackend {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn execute_script(&mut self, sql: &str) -> Result<()> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let affected = stmt.execute(params_from_iter(params.iter()))?;
        Ok(affected as u64)
    }

    fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<QueryRows> {
        let mut stmt = self.conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let width = columns.len();

        let mut result = QueryRows { columns, rows: Vec::new() };
        let mut rows = stmt.query(params_from_iter(params.iter()))?;
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(width);
            for i in 0..width {
                values.push(SqlValue::from(row.get_ref(i)?));
            }
            result.rows.push(values);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execute_and_query() {
        let mut db = SqliteBackend::open_in_memory().unwrap();
        db.execute_script("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)").unwrap();

        let n = db
            .execute("INSERT INTO t (id, name) VALUES (?1, ?2), (?3, ?4)", &[
                SqlValue::Integer(1),
                SqlValue::Text("a".into()),
                SqlValue::Integer(2),
                SqlValue::Null,
            ])
            .unwrap();
        assert_eq!(n, 2);

        let rows = db.query("SELECT id, name FROM t ORDER BY id", &[]).unwrap();
        assert_eq!(rows.columns, vec!["id", "name"]);
        assert_eq!(rows.rows[0], vec![SqlValue::Integer(1), SqlValue::Text("a".into())]);
        assert_eq!(rows.rows[1][1], SqlValue::Null);
    }

    #[test]
    fn test_rollback_discards_work() {
        let mut db = SqliteBackend::open_in_memory().unwrap();
        db.execute_script("CREATE TABLE t (id INTEGER PRIMARY KEY)").unwrap();

        db.begin().unwrap();
        db.execute("INSERT INTO t (id) VALUES (?1)", &[SqlValue::Integer(1)]).unwrap();
        db.rollback().unwrap();

        let rows = db.query("SELECT COUNT(*) FROM t", &[]).unwrap();
        assert_eq!(rows.rows[0][0], SqlValue::Integer(0));
    }

    #[test]
    fn test_read_only_refuses_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ro.sqlite");
        {
            let mut db = SqliteBackend::open(&path).unwrap();
            db.execute_script("CREATE TABLE t (id INTEGER PRIMARY KEY)").unwrap();
        }

        let mut ro = SqliteBackend::open_read_only(&path).unwrap();
        assert!(ro.execute("INSERT INTO t (id) VALUES (1)", &[]).is_err());
        assert!(ro.query("SELECT * FROM t", &[]).unwrap().is_empty());
    }

    #[test]
    fn test_foreign_keys_are_enforced() {
        let mut db = SqliteBackend::open_in_memory().unwrap();
        db.execute_script(
            "CREATE TABLE p (id INTEGER PRIMARY KEY);
             CREATE TABLE c (id INTEGER PRIMARY KEY, p_id INTEGER REFERENCES p(id));",
        )
        .unwrap();
        assert!(db.execute("INSERT INTO c (id, p_id) VALUES (1, 99)", &[]).is_err());
    }
}
