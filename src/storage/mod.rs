//! Storage Layer - one schema, two backends
//!
//! System of record is SQLite or PostgreSQL with tables:
//! - users(id, name), labels(id, name)
//! - issues(id, number, title, state, author_id, …) plus issue_labels / issue_assignees
//! - repository, pull_request, comments, commits (extended dataset)
//! - ingest_runs(table_name, source_path, content_hash, rows_loaded, loaded_at)

pub mod backend;
pub mod dialect;
pub mod executor;
pub mod postgres;
pub mod schema;
pub mod sqlite;
pub mod value;

pub use backend::{Backend, QueryRows};
pub use dialect::{Conflict, Dialect};
pub use executor::{DatabaseTarget, DbStats, Executor, TableCount};
pub use self::postgres::PostgresBackend;
pub use sqlite::SqliteBackend;
pub use value::SqlValue;
