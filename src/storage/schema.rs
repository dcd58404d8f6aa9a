//! Database schema definitions
//!
//! Every statement is idempotent and listed parents-first so foreign keys
//! always point at a table that already exists.

use super::Dialect;

/// Tables in creation order
pub const TABLES: &[&str] = &[
    "users",
    "labels",
    "repository",
    "issues",
    "issue_labels",
    "issue_assignees",
    "pull_request",
    "comments",
    "commits",
    "ingest_runs",
];

mod sqlite {
    pub const PRAGMAS: &[&str] = &[
        "PRAGMA foreign_keys = ON",
    ];

    pub const CREATE_USERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id       INTEGER PRIMARY KEY AUTOINCREMENT,
    name     TEXT NOT NULL UNIQUE
)
"#;

    pub const CREATE_LABELS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS labels (
    id       INTEGER PRIMARY KEY AUTOINCREMENT,
    name     TEXT NOT NULL UNIQUE
)
"#;

    pub const CREATE_REPOSITORY_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS repository (
    id           INTEGER PRIMARY KEY,
    name         TEXT NOT NULL,
    full_name    TEXT,
    owner_id     INTEGER,
    description  TEXT,
    url          TEXT,
    stars        INTEGER,
    forks        INTEGER,
    created_at   TEXT,
    updated_at   TEXT,
    FOREIGN KEY(owner_id) REFERENCES users(id)
)
"#;

    pub const CREATE_ISSUES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS issues (
    id              INTEGER PRIMARY KEY,
    number          INTEGER,
    title           TEXT NOT NULL,
    state           TEXT,
    author_id       INTEGER,
    created_at      TEXT,
    updated_at      TEXT,
    closed_at       TEXT,
    comments_count  INTEGER,
    url             TEXT UNIQUE,
    FOREIGN KEY(author_id) REFERENCES users(id)
)
"#;

    pub const CREATE_ISSUE_LABELS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS issue_labels (
    issue_id   INTEGER NOT NULL,
    label_id   INTEGER NOT NULL,
    PRIMARY KEY (issue_id, label_id),
    FOREIGN KEY(issue_id) REFERENCES issues(id) ON DELETE CASCADE,
    FOREIGN KEY(label_id) REFERENCES labels(id) ON DELETE CASCADE
)
"#;

    pub const CREATE_ISSUE_ASSIGNEES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS issue_assignees (
    issue_id   INTEGER NOT NULL,
    user_id    INTEGER NOT NULL,
    PRIMARY KEY (issue_id, user_id),
    FOREIGN KEY(issue_id) REFERENCES issues(id) ON DELETE CASCADE,
    FOREIGN KEY(user_id)  REFERENCES users(id)  ON DELETE CASCADE
)
"#;

    pub const CREATE_PULL_REQUEST_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS pull_request (
    id             INTEGER PRIMARY KEY,
    number         INTEGER,
    title          TEXT NOT NULL,
    state          TEXT,
    author_id      INTEGER,
    repository_id  INTEGER,
    created_at     TEXT,
    updated_at     TEXT,
    closed_at      TEXT,
    merged_at      TEXT,
    url            TEXT,
    FOREIGN KEY(author_id) REFERENCES users(id),
    FOREIGN KEY(repository_id) REFERENCES repository(id)
)
"#;

    pub const CREATE_COMMENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS comments (
    id          INTEGER PRIMARY KEY,
    issue_id    INTEGER NOT NULL,
    author_id   INTEGER,
    body        TEXT,
    created_at  TEXT,
    updated_at  TEXT,
    FOREIGN KEY(issue_id) REFERENCES issues(id) ON DELETE CASCADE,
    FOREIGN KEY(author_id) REFERENCES users(id)
)
"#;

    pub const CREATE_COMMITS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS commits (
    sha              TEXT PRIMARY KEY,
    pull_request_id  INTEGER,
    author_id        INTEGER,
    message          TEXT,
    committed_at     TEXT,
    FOREIGN KEY(pull_request_id) REFERENCES pull_request(id) ON DELETE CASCADE,
    FOREIGN KEY(author_id) REFERENCES users(id)
)
"#;

    pub const CREATE_INGEST_RUNS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS ingest_runs (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    table_name    TEXT NOT NULL,
    source_path   TEXT NOT NULL,
    content_hash  TEXT NOT NULL,
    rows_loaded   INTEGER NOT NULL,
    loaded_at     TEXT NOT NULL
)
"#;
}

mod pg {
    pub const CREATE_USERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id       BIGSERIAL PRIMARY KEY,
    name     TEXT NOT NULL UNIQUE
)
"#;

    pub const CREATE_LABELS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS labels (
    id       BIGSERIAL PRIMARY KEY,
    name     TEXT NOT NULL UNIQUE
)
"#;

    pub const CREATE_REPOSITORY_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS repository (
    id           BIGINT PRIMARY KEY,
    name         TEXT NOT NULL,
    full_name    TEXT,
    owner_id     BIGINT REFERENCES users(id),
    description  TEXT,
    url          TEXT,
    stars        BIGINT,
    forks        BIGINT,
    created_at   TIMESTAMPTZ,
    updated_at   TIMESTAMPTZ
)
"#;

    pub const CREATE_ISSUES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS issues (
    id              BIGINT PRIMARY KEY,
    number          BIGINT,
    title           TEXT NOT NULL,
    state           TEXT,
    author_id       BIGINT REFERENCES users(id),
    created_at      TIMESTAMPTZ,
    updated_at      TIMESTAMPTZ,
    closed_at       TIMESTAMPTZ,
    comments_count  BIGINT,
    url             TEXT UNIQUE
)
"#;

    pub const CREATE_ISSUE_LABELS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS issue_labels (
    issue_id   BIGINT NOT NULL REFERENCES issues(id) ON DELETE CASCADE,
    label_id   BIGINT NOT NULL REFERENCES labels(id) ON DELETE CASCADE,
    PRIMARY KEY (issue_id, label_id)
)
"#;

    pub const CREATE_ISSUE_ASSIGNEES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS issue_assignees (
    issue_id   BIGINT NOT NULL REFERENCES issues(id) ON DELETE CASCADE,
    user_id    BIGINT NOT NULL REFERENCES users(id)  ON DELETE CASCADE,
    PRIMARY KEY (issue_id, user_id)
)
"#;

    pub const CREATE_PULL_REQUEST_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS pull_request (
    id             BIGINT PRIMARY KEY,
    number         BIGINT,
    title          TEXT NOT NULL,
    state          TEXT,
    author_id      BIGINT REFERENCES users(id),
    repository_id  BIGINT REFERENCES repository(id),
    created_at     TIMESTAMPTZ,
    updated_at     TIMESTAMPTZ,
    closed_at      TIMESTAMPTZ,
    merged_at      TIMESTAMPTZ,
    url            TEXT
)
"#;

    pub const CREATE_COMMENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS comments (
    id          BIGINT PRIMARY KEY,
    issue_id    BIGINT NOT NULL REFERENCES issues(id) ON DELETE CASCADE,
    author_id   BIGINT REFERENCES users(id),
    body        TEXT,
    created_at  TIMESTAMPTZ,
    updated_at  TIMESTAMPTZ
)
"#;

    pub const CREATE_COMMITS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS commits (
    sha              TEXT PRIMARY KEY,
    pull_request_id  BIGINT REFERENCES pull_request(id) ON DELETE CASCADE,
    author_id        BIGINT REFERENCES users(id),
    message          TEXT,
    committed_at     TIMESTAMPTZ
)
"#;

    pub const CREATE_INGEST_RUNS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS ingest_runs (
    id            BIGSERIAL PRIMARY KEY,
    table_name    TEXT NOT NULL,
    source_path   TEXT NOT NULL,
    content_hash  TEXT NOT NULL,
    rows_loaded   BIGINT NOT NULL,
    loaded_at     TIMESTAMPTZ NOT NULL
)
"#;
}

/// SQL to create indexes (same text on both dialects)
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_issues_number ON issues(number)",
    "CREATE INDEX IF NOT EXISTS idx_issues_state ON issues(state)",
    "CREATE INDEX IF NOT EXISTS idx_issues_author ON issues(author_id)",
    "CREATE INDEX IF NOT EXISTS idx_issue_assignees_user ON issue_assignees(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_issue_labels_label ON issue_labels(label_id)",
    "CREATE INDEX IF NOT EXISTS idx_pull_request_repository ON pull_request(repository_id)",
    "CREATE INDEX IF NOT EXISTS idx_pull_request_author ON pull_request(author_id)",
    "CREATE INDEX IF NOT EXISTS idx_comments_issue ON comments(issue_id)",
    "CREATE INDEX IF NOT EXISTS idx_commits_pull_request ON commits(pull_request_id)",
    "CREATE INDEX IF NOT EXISTS idx_ingest_runs_table ON ingest_runs(table_name)",
];

/// Per-connection settings that must run outside a transaction
pub fn connection_pragmas(dialect: Dialect) -> &'static [&'static str] {
    match dialect {
        Dialect::Sqlite => sqlite::PRAGMAS,
        Dialect::Postgres => &[],
    }
}

/// All schema creation statements
pub fn schema_statements(dialect: Dialect) -> Vec<&'static str> {
    let mut stmts = match dialect {
        Dialect::Sqlite => vec![
            sqlite::CREATE_USERS_TABLE,
            sqlite::CREATE_LABELS_TABLE,
            sqlite::CREATE_REPOSITORY_TABLE,
            sqlite::CREATE_ISSUES_TABLE,
            sqlite::CREATE_ISSUE_LABELS_TABLE,
            sqlite::CREATE_ISSUE_ASSIGNEES_TABLE,
            sqlite::CREATE_PULL_REQUEST_TABLE,
            sqlite::CREATE_COMMENTS_TABLE,
            sqlite::CREATE_COMMITS_TABLE,
            sqlite::CREATE_INGEST_RUNS_TABLE,
        ],
        Dialect::Postgres => vec![
            pg::CREATE_USERS_TABLE,
            pg::CREATE_LABELS_TABLE,
            pg::CREATE_REPOSITORY_TABLE,
            pg::CREATE_ISSUES_TABLE,
            pg::CREATE_ISSUE_LABELS_TABLE,
            pg::CREATE_ISSUE_ASSIGNEES_TABLE,
            pg::CREATE_PULL_REQUEST_TABLE,
            pg::CREATE_COMMENTS_TABLE,
            pg::CREATE_COMMITS_TABLE,
            pg::CREATE_INGEST_RUNS_TABLE,
        ],
    };
    stmts.extend(CREATE_INDEXES.iter().copied());
    stmts
}

/// The schema as one script, for humans and for the query tool description
pub fn schema_text(dialect: Dialect) -> String {
    let mut text = String::new();
    for pragma in connection_pragmas(dialect) {
        text.push_str(pragma);
        text.push_str(";\n");
    }
    for stmt in schema_statements(dialect) {
        text.push_str(stmt.trim());
        text.push_str(";\n");
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_table_has_a_create_statement() {
        for dialect in [Dialect::Sqlite, Dialect::Postgres] {
            let stmts = schema_statements(dialect);
            for table in TABLES {
                let needle = format!("CREATE TABLE IF NOT EXISTS {} (", table);
                assert!(
                    stmts.iter().any(|s| s.contains(&needle)),
                    "{:?} schema is missing {}",
                    dialect,
                    table
                );
            }
        }
    }

    #[test]
    fn test_parents_are_created_before_children() {
        let stmts = schema_statements(Dialect::Postgres);
        let position = |table: &str| {
            let needle = format!("CREATE TABLE IF NOT EXISTS {} (", table);
            stmts.iter().position(|s| s.contains(&needle)).unwrap()
        };
        assert!(position("users") < position("issues"));
        assert!(position("issues") < position("issue_labels"));
        assert!(position("repository") < position("pull_request"));
        assert!(position("pull_request") < position("commits"));
        assert!(position("issues") < position("comments"));
    }

    #[test]
    fn test_sqlite_schema_applies_twice() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        for _ in 0..2 {
            for stmt in schema_statements(Dialect::Sqlite) {
                conn.execute(stmt, []).unwrap();
            }
        }
    }

    #[test]
    fn test_schema_text_dialects_differ() {
        let sqlite = schema_text(Dialect::Sqlite);
        let pg = schema_text(Dialect::Postgres);
        assert!(sqlite.starts_with("PRAGMA foreign_keys = ON;"));
        assert!(sqlite.contains("AUTOINCREMENT"));
        assert!(pg.contains("BIGSERIAL"));
        assert!(pg.contains("TIMESTAMPTZ"));
        assert!(!pg.contains("PRAGMA"));
    }
}
