//! # Issuebase - GitHub issue data for agents
//!
//! Loads GitHub issue/PR snapshots into a relational schema and exposes
//! read-only SQL over it.
//!
//! Issuebase provides:
//! - A tabular reader for CSV and Parquet snapshots with date/list normalization
//! - One schema rendered for SQLite and PostgreSQL
//! - A dialect-abstracting executor (placeholders, conflict clauses, batching)
//! - A dependency-ordered loader with per-table failure isolation
//! - A read-only `sql_query_executor` tool, served over HTTP for agents

pub mod config;
pub mod loader;
pub mod logging;
pub mod output;
pub mod reader;
pub mod server;
pub mod storage;
pub mod tools;
pub mod ui;

// Re-exports for convenient access
pub use loader::{LoadOptions, LoadReport, Loader, SourceSet, TableKind};
pub use reader::{Frame, ReadOptions};
pub use storage::{Dialect, Executor, SqlValue};
pub use tools::SqlQueryTool;

/// Result type alias for Issuebase operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Issuebase operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] postgres::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported source: {0}")]
    UnsupportedSource(String),

    #[error("Missing column {column} in {table} source")]
    MissingColumn { table: String, column: String },

    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid tool arguments: {0}")]
    ToolArgs(String),
}
