//! SQL dialects
//!
//! The loader speaks one vocabulary; this module renders it for SQLite or
//! PostgreSQL. Differences covered here:
//! - placeholders (`?1` vs `$1`)
//! - conflict clauses (`INSERT OR IGNORE` vs `ON CONFLICT DO NOTHING`)
//! - the bound-parameter ceiling per statement

use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Sqlite,
    #[serde(alias = "postgresql")]
    Postgres,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Sqlite => "sqlite",
            Dialect::Postgres => "postgres",
        }
    }

    /// Placeholder for the 1-based parameter `n`
    pub fn placeholder(&self, n: usize) -> String {
        match self {
            Dialect::Sqlite => format!("?{}", n),
            Dialect::Postgres => format!("${}", n),
        }
    }

    /// Maximum number of bound parameters in one statement
    pub fn max_params(&self) -> usize {
        match self {
            Dialect::Sqlite => 32_766,
            Dialect::Postgres => 65_535,
        }
    }

    /// Name of the pseudo-table holding the proposed row in an upsert
    fn excluded(&self) -> &'static str {
        match self {
            Dialect::Sqlite => "excluded",
            Dialect::Postgres => "EXCLUDED",
        }
    }
}

impl FromStr for Dialect {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            "postgres" | "postgresql" | "pg" => Ok(Dialect::Postgres),
            _ => Err(crate::Error::Config(format!("Unknown database type: {}", s))),
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What to do when an inserted row collides with an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conflict {
    /// Keep the existing row
    Ignore,
    /// Overwrite every non-key column of the row identified by `key`
    Replace { key: &'static str },
}

/// Render a multi-row INSERT for `row_count` rows of `columns`
pub fn insert_statement(
    dialect: Dialect,
    table: &str,
    columns: &[&str],
    row_count: usize,
    conflict: Conflict,
) -> String {
    let mut sql = String::with_capacity(64 + row_count * columns.len() * 5);

    match (dialect, conflict) {
        (Dialect::Sqlite, Conflict::Ignore) => sql.push_str("INSERT OR IGNORE INTO "),
        _ => sql.push_str("INSERT INTO "),
    }
    sql.push_str(table);
    sql.push_str(" (");
    sql.push_str(&columns.join(", "));
    sql.push_str(") VALUES ");

    let mut n = 1;
    for row in 0..row_count {
        if row > 0 {
            sql.push_str(", ");
        }
        sql.push('(');
        for col in 0..columns.len() {
            if col > 0 {
                sql.push_str(", ");
            }
            sql.push_str(&dialect.placeholder(n));
            n += 1;
        }
        sql.push(')');
    }

    match conflict {
        Conflict::Ignore => {
            if dialect == Dialect::Postgres {
                sql.push_str(" ON CONFLICT DO NOTHING");
            }
        }
        Conflict::Replace { key } => {
            let updates: Vec<String> = columns
                .iter()
                .filter(|c| **c != key)
                .map(|c| format!("{} = {}.{}", c, dialect.excluded(), c))
                .collect();
            if updates.is_empty() {
                sql.push_str(&format!(" ON CONFLICT ({}) DO NOTHING", key));
            } else {
                sql.push_str(&format!(
                    " ON CONFLICT ({}) DO UPDATE SET {}",
                    key,
                    updates.join(", ")
                ));
            }
        }
    }

    sql
}

/// `column IN (…)` over `count` placeholders starting at 1
pub fn in_list(dialect: Dialect, column: &str, count: usize) -> String {
    let placeholders: Vec<String> = (1..=count).map(|n| dialect.placeholder(n)).collect();
    format!("{} IN ({})", column, placeholders.join(", "))
}

/// Rows per INSERT so that rows × columns stays under the parameter ceiling
pub fn rows_per_statement(dialect: Dialect, column_count: usize, batch_size: usize) -> usize {
    let by_params = dialect.max_params() / column_count.max(1);
    batch_size.min(by_params).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders() {
        assert_eq!(Dialect::Sqlite.placeholder(3), "?3");
        assert_eq!(Dialect::Postgres.placeholder(3), "$3");
    }

    #[test]
    fn test_parse_dialect() {
        assert_eq!("postgresql".parse::<Dialect>().unwrap(), Dialect::Postgres);
        assert_eq!("SQLite".parse::<Dialect>().unwrap(), Dialect::Sqlite);
        assert!("mysql".parse::<Dialect>().is_err());
    }

    #[test]
    fn test_sqlite_insert_ignore() {
        let sql = insert_statement(Dialect::Sqlite, "users", &["name"], 2, Conflict::Ignore);
        assert_eq!(sql, "INSERT OR IGNORE INTO users (name) VALUES (?1), (?2)");
    }

    #[test]
    fn test_postgres_insert_ignore() {
        let sql = insert_statement(
            Dialect::Postgres,
            "issue_labels",
            &["issue_id", "label_id"],
            2,
            Conflict::Ignore,
        );
        assert_eq!(
            sql,
            "INSERT INTO issue_labels (issue_id, label_id) VALUES ($1, $2), ($3, $4) ON CONFLICT DO NOTHING"
        );
    }

    #[test]
    fn test_replace_renders_upsert_per_dialect() {
        let cols = ["id", "title", "state"];
        let sqlite = insert_statement(Dialect::Sqlite, "issues", &cols, 1, Conflict::Replace { key: "id" });
        assert_eq!(
            sqlite,
            "INSERT INTO issues (id, title, state) VALUES (?1, ?2, ?3) \
             ON CONFLICT (id) DO UPDATE SET title = excluded.title, state = excluded.state"
        );

        let pg = insert_statement(Dialect::Postgres, "issues", &cols, 1, Conflict::Replace { key: "id" });
        assert!(pg.ends_with("DO UPDATE SET title = EXCLUDED.title, state = EXCLUDED.state"));
        assert!(pg.contains("VALUES ($1, $2, $3)"));
    }

    #[test]
    fn test_replace_with_only_key_column() {
        let sql = insert_statement(Dialect::Postgres, "t", &["id"], 1, Conflict::Replace { key: "id" });
        assert!(sql.ends_with("ON CONFLICT (id) DO NOTHING"));
    }

    #[test]
    fn test_rows_per_statement_respects_ceiling() {
        assert_eq!(rows_per_statement(Dialect::Sqlite, 10, 500), 500);
        assert_eq!(rows_per_statement(Dialect::Sqlite, 11, 100_000), 32_766 / 11);
        assert_eq!(rows_per_statement(Dialect::Postgres, 11, 100_000), 65_535 / 11);
        assert_eq!(rows_per_statement(Dialect::Sqlite, 3, 0), 1);
    }

    #[test]
    fn test_in_list() {
        assert_eq!(in_list(Dialect::Postgres, "name", 3), "name IN ($1, $2, $3)");
    }
}
