use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::loader::LoadOptions;
use crate::storage::{DatabaseTarget, Dialect};

pub const DEFAULT_SQLITE_PATH: &str = "issues.sqlite";
pub const DEFAULT_LOG_DIR: &str = "logs";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct IssuebaseConfig {
    #[serde(default)]
    pub database: DatabaseSection,
    #[serde(default)]
    pub load: LoadSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct DatabaseSection {
    pub kind: Option<Dialect>,
    pub path: Option<PathBuf>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct LoadSection {
    pub batch_size: Option<usize>,
    pub commit_every: Option<usize>,
    pub data_dir: Option<PathBuf>,
    pub list_delimiter: Option<String>,
    pub log_dir: Option<PathBuf>,
}

impl IssuebaseConfig {
    /// The config `init` writes: every default spelled out
    pub fn with_defaults() -> Self {
        let load = LoadOptions::default();
        Self {
            database: DatabaseSection {
                kind: Some(Dialect::Sqlite),
                path: Some(PathBuf::from(DEFAULT_SQLITE_PATH)),
                url: None,
            },
            load: LoadSection {
                batch_size: Some(load.batch_size),
                commit_every: Some(load.commit_every),
                data_dir: Some(PathBuf::from("data")),
                list_delimiter: Some(load.list_delimiter),
                log_dir: Some(PathBuf::from(DEFAULT_LOG_DIR)),
            },
        }
    }

    /// Loader options from the `[load]` section, defaults elsewhere
    pub fn load_options(&self) -> LoadOptions {
        let defaults = LoadOptions::default();
        LoadOptions {
            batch_size: self.load.batch_size.unwrap_or(defaults.batch_size).max(1),
            commit_every: self.load.commit_every.unwrap_or(defaults.commit_every).max(1),
            list_delimiter: self
                .load
                .list_delimiter
                .clone()
                .filter(|d| !d.is_empty())
                .unwrap_or(defaults.list_delimiter),
            skip_unchanged: defaults.skip_unchanged,
        }
    }

    pub fn log_dir(&self) -> PathBuf {
        self.load
            .log_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR))
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("issuebase.toml")
}

/// Read `.env` into the process environment, if there is one
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!("Ignoring unreadable .env: {}", e),
    }
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<IssuebaseConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: IssuebaseConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &IssuebaseConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn ensure_db_dir(db_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Database settings that override the config file
#[derive(Debug, Clone, Default)]
pub struct DatabaseOverrides {
    pub kind: Option<Dialect>,
    pub url: Option<String>,
    pub sqlite_path: Option<PathBuf>,
}

impl DatabaseOverrides {
    /// `DATABASE_TYPE`, `DATABASE_URL` and `ISSUEBASE_SQLITE_PATH`
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let non_empty = |key: &str| var(key).filter(|v| !v.trim().is_empty());
        let kind = match non_empty("DATABASE_TYPE") {
            Some(raw) => Some(raw.parse::<Dialect>()?),
            None => None,
        };
        Ok(Self {
            kind,
            url: non_empty("DATABASE_URL"),
            sqlite_path: non_empty("ISSUEBASE_SQLITE_PATH").map(PathBuf::from),
        })
    }

    /// Fill unset fields from `lower`
    pub fn or(self, lower: DatabaseOverrides) -> DatabaseOverrides {
        DatabaseOverrides {
            kind: self.kind.or(lower.kind),
            url: self.url.or(lower.url),
            sqlite_path: self.sqlite_path.or(lower.sqlite_path),
        }
    }
}

/// Pick the database: overrides first, then the config file, then SQLite
/// at `issues.sqlite`
pub fn resolve_target(
    config: &IssuebaseConfig,
    overrides: DatabaseOverrides,
) -> anyhow::Result<DatabaseTarget> {
    let kind = overrides
        .kind
        .or(config.database.kind)
        .unwrap_or_default();

    match kind {
        Dialect::Sqlite => {
            let path = overrides
                .sqlite_path
                .or_else(|| config.database.path.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SQLITE_PATH));
            Ok(DatabaseTarget::Sqlite(path))
        }
        Dialect::Postgres => {
            let Some(url) = overrides.url.or_else(|| config.database.url.clone()) else {
                anyhow::bail!("postgresql needs a connection URL (DATABASE_URL or --database-url)");
            };
            Ok(DatabaseTarget::Postgres(url))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_write_refuses_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("issuebase.toml");
        let config = IssuebaseConfig::with_defaults();

        write_config(&path, &config, false).unwrap();
        assert!(write_config(&path, &config, false).is_err());
        write_config(&path, &config, true).unwrap();

        let loaded = load_config(Some(&path)).unwrap().unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_config_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("nope.toml"))).unwrap().is_none());
    }

    #[test]
    fn test_partial_config_parses() {
        let config: IssuebaseConfig = toml::from_str(
            r#"
[database]
kind = "postgresql"
url = "postgres://u:p@localhost/issues"

[load]
batch_size = 100
"#,
        )
        .unwrap();
        assert_eq!(config.database.kind, Some(Dialect::Postgres));
        let options = config.load_options();
        assert_eq!(options.batch_size, 100);
        assert_eq!(options.commit_every, 10);
        assert_eq!(options.list_delimiter, ";");
    }

    #[test]
    fn test_default_target_is_sqlite() {
        let target = resolve_target(&IssuebaseConfig::default(), DatabaseOverrides::default()).unwrap();
        assert_eq!(target, DatabaseTarget::Sqlite(PathBuf::from("issues.sqlite")));
    }

    #[test]
    fn test_env_overrides_file_and_cli_overrides_env() {
        let mut config = IssuebaseConfig::default();
        config.database.path = Some(PathBuf::from("from-file.sqlite"));

        let env = DatabaseOverrides::from_vars(vars(&[("ISSUEBASE_SQLITE_PATH", "from-env.sqlite")])).unwrap();
        let target = resolve_target(&config, env.clone()).unwrap();
        assert_eq!(target, DatabaseTarget::Sqlite(PathBuf::from("from-env.sqlite")));

        let cli = DatabaseOverrides {
            sqlite_path: Some(PathBuf::from("from-cli.sqlite")),
            ..Default::default()
        };
        let target = resolve_target(&config, cli.or(env)).unwrap();
        assert_eq!(target, DatabaseTarget::Sqlite(PathBuf::from("from-cli.sqlite")));
    }

    #[test]
    fn test_postgres_from_env() {
        let env = DatabaseOverrides::from_vars(vars(&[
            ("DATABASE_TYPE", "PostgreSQL"),
            ("DATABASE_URL", "postgres://u:p@db/issues"),
        ]))
        .unwrap();
        let target = resolve_target(&IssuebaseConfig::default(), env).unwrap();
        assert_eq!(target, DatabaseTarget::Postgres("postgres://u:p@db/issues".into()));
    }

    #[test]
    fn test_postgres_without_url_is_error() {
        let env = DatabaseOverrides::from_vars(vars(&[("DATABASE_TYPE", "postgresql")])).unwrap();
        assert!(resolve_target(&IssuebaseConfig::default(), env).is_err());
        assert!(DatabaseOverrides::from_vars(vars(&[("DATABASE_TYPE", "oracle")])).is_err());
    }
}
