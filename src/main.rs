//! Issuebase CLI - GitHub issue snapshots as a read-only SQL tool for agents

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use issuebase::config::{self, DatabaseOverrides};
use issuebase::logging;
use issuebase::ui;
use issuebase::storage::Dialect;

mod commands;

#[derive(Parser)]
#[command(name = "issuebase")]
#[command(version)]
#[command(about = "Load GitHub issue snapshots into SQLite or PostgreSQL and query them read-only")]
#[command(long_about = r#"
Issuebase loads GitHub issue, pull request, comment and commit snapshots
(CSV, TSV or Parquet) into a relational schema, then exposes the database to
agents through a read-only `sql_query_executor` tool.

Example usage:
  issuebase init
  issuebase load --data-dir ./data
  issuebase query "SELECT state, COUNT(*) FROM issues GROUP BY state" --table
  issuebase serve --port 8080
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print machine-readable JSON instead of human output
    #[arg(long, global = true)]
    json: bool,

    /// Path to the config file (default: issuebase.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Database backend: sqlite or postgresql (overrides DATABASE_TYPE)
    #[arg(long, global = true)]
    database_type: Option<Dialect>,

    /// PostgreSQL connection URL (overrides DATABASE_URL)
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// SQLite database file (overrides ISSUEBASE_SQLITE_PATH)
    #[arg(long, global = true)]
    sqlite_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default issuebase.toml
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Create the schema in the database, or print it
    Schema {
        /// Print the DDL instead of applying it
        #[arg(long)]
        print: bool,
    },

    /// Load snapshot files into the database
    Load(commands::LoadArgs),

    /// Run a read-only SQL query
    Query {
        /// SQL to run
        sql: String,

        /// Render rows as a table instead of JSON
        #[arg(long)]
        table: bool,
    },

    /// Show row counts per table
    Stats,

    /// Serve the tool layer over HTTP
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },

    /// Show version information
    Version,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

impl OutputMode {
    pub fn is_human(self) -> bool {
        self == OutputMode::Human
    }
}

/// Print the `{ok, command, data}` envelope in JSON mode
pub fn emit_success(output_mode: OutputMode, command: &str, data: serde_json::Value) -> anyhow::Result<()> {
    if output_mode == OutputMode::Json {
        let envelope = serde_json::json!({
            "ok": true,
            "command": command,
            "data": data,
        });
        println!("{}", serde_json::to_string_pretty(&envelope)?);
    }
    Ok(())
}

/// `{ok: false, command, error}`, plus `data` when the command produced a report
fn failure_envelope(command: &str, error: &anyhow::Error) -> serde_json::Value {
    let mut envelope = serde_json::json!({
        "ok": false,
        "command": command,
        "error": format!("{:#}", error),
    });
    if let Some(failure) = error.downcast_ref::<commands::ReportedFailure>() {
        envelope["data"] = failure.data.clone();
    }
    envelope
}

fn emit_failure(command: &str, error: &anyhow::Error) {
    match serde_json::to_string_pretty(&failure_envelope(command, error)) {
        Ok(text) => println!("{}", text),
        Err(_) => eprintln!("{:#}", error),
    }
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Init { .. } => "init",
            Commands::Schema { .. } => "schema",
            Commands::Load(_) => "load",
            Commands::Query { .. } => "query",
            Commands::Stats => "stats",
            Commands::Serve { .. } => "serve",
            Commands::Version => "version",
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let output_mode = if cli.json { OutputMode::Json } else { OutputMode::Human };
    let command = cli.command.name();

    match run(cli, output_mode) {
        Ok(()) => Ok(()),
        Err(e) if output_mode == OutputMode::Json => {
            emit_failure(command, &e);
            std::process::exit(1);
        }
        Err(e) => {
            ui::error(&format!("{:#}", e));
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli, output_mode: OutputMode) -> anyhow::Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(config::default_config_path);
    let file_config = config::load_config(Some(config_path.as_path()))?.unwrap_or_default();

    let _log_guard = logging::init_tracing(cli.verbose, &file_config.log_dir())?;
    config::load_dotenv();

    let overrides = DatabaseOverrides {
        kind: cli.database_type,
        url: cli.database_url.clone(),
        sqlite_path: cli.sqlite_path.clone(),
    }
    .or(DatabaseOverrides::from_env()?);
    let target = || config::resolve_target(&file_config, overrides.clone());

    match cli.command {
        Commands::Init { force } => commands::run_init(output_mode, &config_path, force),
        Commands::Schema { print } => commands::run_schema(output_mode, &target()?, print),
        Commands::Load(args) => commands::run_load(output_mode, &target()?, &file_config, args),
        Commands::Query { sql, table } => commands::run_query(output_mode, target()?, &sql, table),
        Commands::Stats => commands::run_stats(output_mode, &target()?),
        Commands::Serve { port } => commands::run_serve(target()?, port),
        Commands::Version => commands::run_version(output_mode),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_envelope_carries_report() {
        let err: anyhow::Error = commands::ReportedFailure {
            message: "1 table(s) failed to load: repository".into(),
            data: serde_json::json!({ "tables": [] }),
        }
        .into();
        let envelope = failure_envelope("load", &err);
        assert_eq!(envelope["ok"], false);
        assert_eq!(envelope["command"], "load");
        assert_eq!(envelope["error"], "1 table(s) failed to load: repository");
        assert_eq!(envelope["data"], serde_json::json!({ "tables": [] }));
    }

    #[test]
    fn test_failure_envelope_without_report() {
        let err = anyhow::anyhow!("no source files found");
        let envelope = failure_envelope("load", &err);
        assert!(envelope.get("data").is_none());
    }
}
