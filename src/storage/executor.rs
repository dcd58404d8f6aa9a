//! Dialect-abstracting executor
//!
//! The loader and the query tool talk to this type only. It picks the
//! placeholder syntax and conflict clause for the backend's dialect, and it
//! splits bulk inserts so each statement stays under the parameter ceiling.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use chrono::Utc;
use serde::Serialize;
use crate::Result;
use super::backend::{Backend, QueryRows};
use super::dialect::{self, Conflict};
use super::postgres::PostgresBackend;
use super::sqlite::SqliteBackend;
use super::{schema, Dialect, SqlValue};

/// Default number of rows per INSERT statement
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Where the data lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseTarget {
    Sqlite(PathBuf),
    Postgres(String),
}

impl DatabaseTarget {
    pub fn dialect(&self) -> Dialect {
        match self {
            DatabaseTarget::Sqlite(_) => Dialect::Sqlite,
            DatabaseTarget::Postgres(_) => Dialect::Postgres,
        }
    }

    /// Human-readable location with any password masked
    pub fn describe(&self) -> String {
        match self {
            DatabaseTarget::Sqlite(path) => path.display().to_string(),
            DatabaseTarget::Postgres(url) => mask_password(url),
        }
    }

    /// Open a read-write connection for loading
    pub fn open(&self) -> Result<Executor> {
        let backend: Box<dyn Backend> = match self {
            DatabaseTarget::Sqlite(path) => Box::new(SqliteBackend::open(path)?),
            DatabaseTarget::Postgres(url) => Box::new(PostgresBackend::connect(url)?),
        };
        Ok(Executor::new(backend))
    }

    /// Open a connection that cannot modify data
    pub fn open_read_only(&self) -> Result<Executor> {
        let backend: Box<dyn Backend> = match self {
            DatabaseTarget::Sqlite(path) => Box::new(SqliteBackend::open_read_only(path)?),
            DatabaseTarget::Postgres(url) => Box::new(PostgresBackend::connect_read_only(url)?),
        };
        Ok(Executor::new(backend))
    }
}

fn mask_password(url: &str) -> String {
    let Some(scheme_end) = url.find("://") else {
        return url.to_string();
    };
    let rest = &url[scheme_end + 3..];
    let Some(at) = rest.find('@') else {
        return url.to_string();
    };
    match rest[..at].find(':') {
        Some(colon) => format!(
            "{}{}:***{}",
            &url[..scheme_end + 3],
            &rest[..colon],
            &rest[at..]
        ),
        None => url.to_string(),
    }
}

/// Executes loader and tool statements against any backend
pub struct Executor {
    backend: Box<dyn Backend>,
    batch_size: usize,
}

impl Executor {
    pub fn new(backend: Box<dyn Backend>) -> Self {
        Self { backend, batch_size: DEFAULT_BATCH_SIZE }
    }

    /// In-memory SQLite with the schema applied (for testing)
    pub fn sqlite_in_memory() -> Result<Self> {
        let mut executor = Self::new(Box::new(SqliteBackend::open_in_memory()?));
        executor.ensure_schema()?;
        Ok(executor)
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.backend.dialect()
    }

    /// Create every table and index that doesn't exist yet
    pub fn ensure_schema(&mut self) -> Result<()> {
        for stmt in schema::schema_statements(self.dialect()) {
            self.backend.execute_script(stmt)?;
        }
        Ok(())
    }

    // ========== Transactions ==========

    pub fn begin(&mut self) -> Result<()> {
        self.backend.begin()
    }

    pub fn commit(&mut self) -> Result<()> {
        self.backend.commit()
    }

    pub fn rollback(&mut self) -> Result<()> {
        self.backend.rollback()
    }

    // ========== Raw access ==========

    pub fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        self.backend.execute(sql, params)
    }

    pub fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<QueryRows> {
        self.backend.query(sql, params)
    }

    // ========== Bulk Operations ==========

    /// Insert `rows` into `table`, several rows per statement.
    ///
    /// Every row must have one value per column. Returns the number of rows
    /// the database reports as affected.
    pub fn insert_rows(
        &mut self,
        table: &str,
        columns: &[&str],
        rows: &[Vec<SqlValue>],
        conflict: Conflict,
    ) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let dialect = self.dialect();
        let per_statement = dialect::rows_per_statement(dialect, columns.len(), self.batch_size);

        let mut affected = 0;
        for chunk in rows.chunks(per_statement) {
            let sql = dialect::insert_statement(dialect, table, columns, chunk.len(), conflict);
            let params: Vec<SqlValue> = chunk.iter().flat_map(|row| row.iter().cloned()).collect();
            affected += self.backend.execute(&sql, &params)?;
        }
        tracing::debug!(table, rows = rows.len(), affected, "inserted rows");
        Ok(affected)
    }

    /// Make sure every name exists in a `(id, name UNIQUE)` table and return
    /// the id of each one.
    pub fn upsert_names(&mut self, table: &str, names: &[String]) -> Result<HashMap<String, i64>> {
        let mut ids = HashMap::with_capacity(names.len());
        if names.is_empty() {
            return Ok(ids);
        }
        let dialect = self.dialect();

        let rows: Vec<Vec<SqlValue>> = names.iter().map(|n| vec![SqlValue::Text(n.clone())]).collect();
        self.insert_rows(table, &["name"], &rows, Conflict::Ignore)?;

        let per_statement = dialect::rows_per_statement(dialect, 1, self.batch_size);
        for chunk in names.chunks(per_statement) {
            let sql = format!(
                "SELECT id, name FROM {} WHERE {}",
                table,
                dialect::in_list(dialect, "name", chunk.len())
            );
            let params: Vec<SqlValue> = chunk.iter().map(|n| SqlValue::Text(n.clone())).collect();
            for row in self.backend.query(&sql, &params)?.rows {
                if let (Some(id), Some(name)) = (row[0].as_i64(), row[1].as_str()) {
                    ids.insert(name.to_string(), id);
                }
            }
        }
        Ok(ids)
    }

    /// All integer keys currently stored in `table.key`
    pub fn existing_ids(&mut self, table: &str, key: &str) -> Result<HashSet<i64>> {
        let rows = self.backend.query(&format!("SELECT {} FROM {}", key, table), &[])?;
        Ok(rows.rows.iter().filter_map(|r| r[0].as_i64()).collect())
    }

    /// Map each non-NULL `column` value to the `key` of the row holding it
    pub fn column_owners(&mut self, table: &str, column: &str, key: &str) -> Result<HashMap<String, i64>> {
        let rows = self.backend.query(
            &format!("SELECT {}, {} FROM {} WHERE {} IS NOT NULL", column, key, table, column),
            &[],
        )?;
        Ok(rows
            .rows
            .iter()
            .filter_map(|r| Some((r[0].as_str()?.to_string(), r[1].as_i64()?)))
            .collect())
    }

    /// Count rows in a table
    pub fn count(&mut self, table: &str) -> Result<u64> {
        let rows = self.backend.query(&format!("SELECT COUNT(*) FROM {}", table), &[])?;
        let count = rows.rows.first().and_then(|r| r[0].as_i64()).unwrap_or(0);
        Ok(count as u64)
    }

    /// Get database statistics
    pub fn stats(&mut self) -> Result<DbStats> {
        let mut tables = Vec::with_capacity(schema::TABLES.len());
        for table in schema::TABLES {
            tables.push(TableCount { table: table.to_string(), rows: self.count(table)? });
        }
        Ok(DbStats { dialect: self.dialect(), tables })
    }

    // ========== Ingest bookkeeping ==========

    /// Hash recorded by the most recent successful load of `table`
    pub fn last_content_hash(&mut self, table: &str) -> Result<Option<String>> {
        let sql = format!(
            "SELECT content_hash FROM ingest_runs WHERE table_name = {} ORDER BY id DESC LIMIT 1",
            self.dialect().placeholder(1)
        );
        let rows = self.backend.query(&sql, &[SqlValue::Text(table.to_string())])?;
        Ok(rows
            .rows
            .first()
            .and_then(|r| r[0].as_str())
            .map(String::from))
    }

    pub fn record_ingest_run(
        &mut self,
        table: &str,
        source_path: &str,
        content_hash: &str,
        rows_loaded: u64,
    ) -> Result<()> {
        let rows = vec![vec![
            SqlValue::Text(table.to_string()),
            SqlValue::Text(source_path.to_string()),
            SqlValue::Text(content_hash.to_string()),
            SqlValue::Integer(rows_loaded as i64),
            SqlValue::Timestamp(Utc::now()),
        ]];
        self.insert_rows(
            "ingest_runs",
            &["table_name", "source_path", "content_hash", "rows_loaded", "loaded_at"],
            &rows,
            Conflict::Ignore,
        )?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TableCount {
    pub table: String,
    pub rows: u64,
}

/// Database statistics
#[derive(Debug, Clone, Serialize)]
pub struct DbStats {
    pub dialect: Dialect,
    pub tables: Vec<TableCount>,
}

impl DbStats {
    pub fn rows(&self, table: &str) -> u64 {
        self.tables
            .iter()
            .find(|t| t.table == table)
            .map(|t| t.rows)
            .unwrap_or(0)
    }
}

impl std::fmt::Display for DbStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Database Statistics ({}):", self.dialect)?;
        for t in &self.tables {
            writeln!(f, "  {}: {}", t.table, t.rows)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_names_is_idempotent() {
        let mut db = Executor::sqlite_in_memory().unwrap();
        let names = vec!["alice".to_string(), "bob".to_string()];

        let first = db.upsert_names("users", &names).unwrap();
        let second = db.upsert_names("users", &names).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert_eq!(db.count("users").unwrap(), 2);
    }

    #[test]
    fn test_insert_rows_splits_into_statements() {
        let mut db = Executor::sqlite_in_memory().unwrap().with_batch_size(3);
        let rows: Vec<Vec<SqlValue>> = (1..=10)
            .map(|i| vec![SqlValue::Text(format!("label-{}", i))])
            .collect();

        let affected = db.insert_rows("labels", &["name"], &rows, Conflict::Ignore).unwrap();
        assert_eq!(affected, 10);
        assert_eq!(db.count("labels").unwrap(), 10);
    }

    #[test]
    fn test_replace_updates_existing_row() {
        let mut db = Executor::sqlite_in_memory().unwrap();
        let cols = ["id", "title", "state"];
        let row = |title: &str, state: &str| {
            vec![SqlValue::Integer(1), SqlValue::Text(title.into()), SqlValue::Text(state.into())]
        };

        db.insert_rows("issues", &cols, &[row("old", "open")], Conflict::Replace { key: "id" }).unwrap();
        db.insert_rows("issues", &cols, &[row("new", "closed")], Conflict::Replace { key: "id" }).unwrap();

        let rows = db.query("SELECT title, state FROM issues", &[]).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows.rows[0][0], SqlValue::Text("new".into()));
        assert_eq!(rows.rows[0][1], SqlValue::Text("closed".into()));
    }

    #[test]
    fn test_replace_keeps_link_rows() {
        let mut db = Executor::sqlite_in_memory().unwrap();
        let cols = ["id", "title"];
        let issue = vec![vec![SqlValue::Integer(1), SqlValue::Text("t".into())]];
        db.insert_rows("issues", &cols, &issue, Conflict::Replace { key: "id" }).unwrap();

        let labels = db.upsert_names("labels", &["bug".to_string()]).unwrap();
        let link = vec![vec![SqlValue::Integer(1), SqlValue::Integer(labels["bug"])]];
        db.insert_rows("issue_labels", &["issue_id", "label_id"], &link, Conflict::Ignore).unwrap();

        db.insert_rows("issues", &cols, &issue, Conflict::Replace { key: "id" }).unwrap();
        assert_eq!(db.count("issue_labels").unwrap(), 1);
    }

    #[test]
    fn test_ingest_runs_round_trip() {
        let mut db = Executor::sqlite_in_memory().unwrap();
        assert_eq!(db.last_content_hash("issues").unwrap(), None);

        db.record_ingest_run("issues", "a.csv", "h1", 3).unwrap();
        db.record_ingest_run("issues", "a.csv", "h2", 3).unwrap();
        assert_eq!(db.last_content_hash("issues").unwrap().as_deref(), Some("h2"));
    }

    #[test]
    fn test_stats_lists_every_table() {
        let mut db = Executor::sqlite_in_memory().unwrap();
        db.upsert_names("users", &["octocat".to_string()]).unwrap();
        let stats = db.stats().unwrap();
        assert_eq!(stats.tables.len(), schema::TABLES.len());
        assert_eq!(stats.rows("users"), 1);
        assert_eq!(stats.rows("issues"), 0);
    }

    #[test]
    fn test_mask_password() {
        assert_eq!(
            mask_password("postgres://app:secret@db:5432/issues"),
            "postgres://app:***@db:5432/issues"
        );
        assert_eq!(mask_password("postgres://db/issues"), "postgres://db/issues");
    }
}
