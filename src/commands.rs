use crate::{OutputMode, emit_success};
use clap::Args;
use issuebase::config::{self, IssuebaseConfig};
use issuebase::loader::{LoadOptions, Loader, SourceSet, TableKind, TableStatus};
use issuebase::storage::{DatabaseTarget, schema};
use issuebase::tools::SqlQueryTool;
use issuebase::ui::{self, Icons, ProgressManager, Spinner};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// A command that finished with a report but still failed.
///
/// JSON mode puts `data` in the failure envelope instead of printing a
/// success envelope first.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ReportedFailure {
    pub message: String,
    pub data: serde_json::Value,
}

#[derive(Args, Debug, Default)]
pub struct LoadArgs {
    /// Directory holding `<table>.{csv,tsv,parquet}` files
    #[arg(short, long)]
    pub data_dir: Option<PathBuf>,

    /// Issues snapshot
    #[arg(long)]
    pub issues: Option<PathBuf>,

    /// Repository snapshot
    #[arg(long)]
    pub repository: Option<PathBuf>,

    /// Pull request snapshot
    #[arg(long)]
    pub pull_requests: Option<PathBuf>,

    /// Comments snapshot
    #[arg(long)]
    pub comments: Option<PathBuf>,

    /// Commits snapshot
    #[arg(long)]
    pub commits: Option<PathBuf>,

    /// Records per batch
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Batches per transaction
    #[arg(long)]
    pub commit_every: Option<usize>,

    /// Skip files unchanged since their last successful load
    #[arg(long)]
    pub skip_unchanged: bool,
}

impl LoadArgs {
    fn explicit_sources(&self) -> SourceSet {
        let mut set = SourceSet::new();
        let pairs = [
            (TableKind::Issues, &self.issues),
            (TableKind::Repository, &self.repository),
            (TableKind::PullRequests, &self.pull_requests),
            (TableKind::Comments, &self.comments),
            (TableKind::Commits, &self.commits),
        ];
        for (kind, path) in pairs {
            if let Some(path) = path {
                set.insert(kind, path.clone());
            }
        }
        set
    }

    fn options(&self, config: &IssuebaseConfig) -> LoadOptions {
        let mut options = config.load_options();
        if let Some(size) = self.batch_size {
            options.batch_size = size.max(1);
        }
        if let Some(every) = self.commit_every {
            options.commit_every = every.max(1);
        }
        options.skip_unchanged = self.skip_unchanged;
        options
    }
}

fn prepare_target(target: &DatabaseTarget) -> anyhow::Result<()> {
    if let DatabaseTarget::Sqlite(path) = target {
        config::ensure_db_dir(path)?;
    }
    Ok(())
}

pub fn run_init(output_mode: OutputMode, config_path: &Path, force: bool) -> anyhow::Result<()> {
    let config = IssuebaseConfig::with_defaults();
    config::write_config(config_path, &config, force)?;

    if output_mode.is_human() {
        ui::success(&format!("Wrote {}", config_path.display()));
        ui::status(Icons::GEAR, "Database", &format!("sqlite at {}", config::DEFAULT_SQLITE_PATH));
        ui::status(Icons::INFO, "Next", "issuebase load --data-dir ./data");
    } else {
        emit_success(
            output_mode,
            "init",
            serde_json::json!({ "config": config_path.display().to_string() }),
        )?;
    }
    Ok(())
}

pub fn run_schema(output_mode: OutputMode, target: &DatabaseTarget, print: bool) -> anyhow::Result<()> {
    let dialect = target.dialect();

    if print {
        let ddl = schema::schema_text(dialect);
        if output_mode.is_human() {
            println!("{}", ddl);
        } else {
            emit_success(
                output_mode,
                "schema",
                serde_json::json!({ "dialect": dialect, "schema": ddl }),
            )?;
        }
        return Ok(());
    }

    prepare_target(target)?;
    let mut db = target.open()?;
    db.ensure_schema()?;
    tracing::info!("Schema ready in {}", target.describe());

    if output_mode.is_human() {
        ui::success(&format!("Schema ready ({})", dialect));
        ui::status(Icons::DATABASE, "Database", &target.describe());
    } else {
        emit_success(
            output_mode,
            "schema",
            serde_json::json!({ "dialect": dialect, "database": target.describe() }),
        )?;
    }
    Ok(())
}

pub fn run_load(
    output_mode: OutputMode,
    target: &DatabaseTarget,
    file_config: &IssuebaseConfig,
    args: LoadArgs,
) -> anyhow::Result<()> {
    let mut sources = match (&args.data_dir, &file_config.load.data_dir) {
        (Some(dir), _) => SourceSet::discover(dir)?,
        (None, Some(dir)) if dir.is_dir() => SourceSet::discover(dir)?,
        _ => SourceSet::new(),
    };
    sources.merge(args.explicit_sources());

    if sources.is_empty() {
        anyhow::bail!("no source files found (pass --data-dir or per-table paths such as --issues)");
    }

    let options = args.options(file_config);

    if output_mode.is_human() {
        ui::banner(
            &format!("{}", "Issuebase Load".bold().style(ui::theme().info.clone())),
            &format!("{} source file(s) into {}", sources.len(), target.dialect()),
        );
        ui::status(Icons::DATABASE, "Database", &target.describe());
        for kind in sources.kinds() {
            if let Some(path) = sources.get(kind) {
                ui::status(Icons::FILE, kind.table(), &path.display().to_string());
            }
        }
        println!();
    }

    prepare_target(target)?;
    let db = target.open()?;

    let start = Instant::now();
    let (mut pm, tx) = ProgressManager::new();
    let mut loader = Loader::new(db, options).with_progress(tx);
    let report = loader.run(&sources);
    drop(loader);
    let report = match report {
        Ok(report) => report,
        Err(e) => {
            pm.finish();
            return Err(e.into());
        }
    };

    pm.finish();
    let failed: Vec<&str> = report.failed().map(|t| t.table.table()).collect();

    if output_mode.is_human() {
        ui::section(" Tables ");
        for table in &report.tables {
            match &table.status {
                TableStatus::Loaded => {
                    ui::table_loaded(table.table.table(), table.rows_written, table.rows_skipped)
                }
                TableStatus::Unchanged => ui::table_unchanged(table.table.table()),
                TableStatus::Failed(reason) => ui::table_failed(table.table.table(), reason),
            }
        }
        pm.finish_with_summary(start.elapsed(), report.tables.len(), report.rows_written());
    } else if failed.is_empty() {
        emit_success(output_mode, "load", serde_json::to_value(&report)?)?;
    }

    if !failed.is_empty() {
        return Err(ReportedFailure {
            message: format!("{} table(s) failed to load: {}", failed.len(), failed.join(", ")),
            data: serde_json::to_value(&report)?,
        }
        .into());
    }
    Ok(())
}

pub fn run_query(output_mode: OutputMode, target: DatabaseTarget, sql: &str, table: bool) -> anyhow::Result<()> {
    let tool = SqlQueryTool::new(target);

    if !output_mode.is_human() {
        let rows = tool.query_json(sql)?;
        emit_success(output_mode, "query", rows)?;
        return Ok(());
    }

    let spinner = Spinner::new("Running query...");
    let result = tool.query_rows(sql);
    spinner.finish_and_clear();
    let rows = result?;

    if table {
        if rows.columns.is_empty() {
            ui::warn("Query returned no columns");
        } else {
            println!("{}", ui::rows_table(&rows));
        }
        ui::status(Icons::ROWS, "Rows", &rows.len().to_string());
    } else {
        println!("{}", serde_json::to_string_pretty(&rows.to_json())?);
    }
    Ok(())
}

pub fn run_stats(output_mode: OutputMode, target: &DatabaseTarget) -> anyhow::Result<()> {
    let mut db = target.open_read_only()?;
    let stats = db.stats()?;

    if output_mode.is_human() {
        ui::header(&format!("Database Statistics ({})", stats.dialect));
        ui::status(Icons::DATABASE, "Database", &target.describe());
        println!("{}", ui::stats_table(&stats));
    } else {
        emit_success(output_mode, "stats", serde_json::to_value(&stats)?)?;
    }
    Ok(())
}

pub fn run_serve(target: DatabaseTarget, port: u16) -> anyhow::Result<()> {
    let tool = SqlQueryTool::new(target);
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(issuebase::server::start_server(port, tool))
}

pub fn run_version(output_mode: OutputMode) -> anyhow::Result<()> {
    if output_mode.is_human() {
        ui::banner(
            &format!("{}", "Issuebase".bold().style(ui::theme().info.clone())),
            &format!("Version {}", env!("CARGO_PKG_VERSION").bold()),
        );
    } else {
        let data = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
        });
        emit_success(output_mode, "version", data)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_sources_only_include_given_paths() {
        let args = LoadArgs {
            issues: Some(PathBuf::from("a/issues.csv")),
            commits: Some(PathBuf::from("b/commits.parquet")),
            ..Default::default()
        };
        let set = args.explicit_sources();
        assert_eq!(set.kinds(), vec![TableKind::Issues, TableKind::Commits]);
        assert_eq!(set.get(TableKind::Issues), Some(Path::new("a/issues.csv")));
    }

    #[test]
    fn test_cli_flags_override_config_options() {
        let mut config = IssuebaseConfig::default();
        config.load.batch_size = Some(50);
        config.load.commit_every = Some(3);

        let args = LoadArgs {
            batch_size: Some(0),
            skip_unchanged: true,
            ..Default::default()
        };
        let options = args.options(&config);
        assert_eq!(options.batch_size, 1);
        assert_eq!(options.commit_every, 3);
        assert!(options.skip_unchanged);
    }

    #[test]
    fn test_failed_load_returns_report_without_printing_success() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("repository.csv"), "NAME\nno-id-column\n").unwrap();
        std::fs::write(dir.path().join("issues.csv"), "ID,TITLE\n1,Crash\n").unwrap();
        let target = DatabaseTarget::Sqlite(dir.path().join("issues.sqlite"));
        let args = LoadArgs {
            data_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        };

        let err = run_load(OutputMode::Json, &target, &IssuebaseConfig::default(), args).unwrap_err();
        let failure = err.downcast_ref::<ReportedFailure>().unwrap();
        assert!(failure.message.contains("repository"));
        assert_eq!(failure.data["tables"][0]["table"], "repository");
        assert_eq!(failure.data["tables"][1]["status"], "loaded");
    }
}
