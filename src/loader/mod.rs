//! Loader - snapshot files into the relational schema
//!
//! Tables load parents-first. Each table runs in its own transaction,
//! committed every `commit_every` batches, so a failing table rolls back
//! its open work and the loader moves on to the next one.

pub mod plan;
pub mod tables;

pub use plan::{load_order, SourceSet, TableKind};

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use crossbeam::channel::Sender;
use serde::{Serialize, Serializer};
use crate::reader::{self, DEFAULT_LIST_DELIMITER};
use crate::storage::{Conflict, Executor};
use crate::ui::ProgressMessage;
use crate::Result;
use tables::{DimensionNames, Dimensions, ParentIds, UrlClaims};

/// Loader tuning
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Records per batch, also rows per INSERT statement
    pub batch_size: usize,
    /// Batches per transaction
    pub commit_every: usize,
    pub list_delimiter: String,
    /// Skip files whose hash matches the last successful load
    pub skip_unchanged: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            batch_size: crate::storage::executor::DEFAULT_BATCH_SIZE,
            commit_every: 10,
            list_delimiter: DEFAULT_LIST_DELIMITER.to_string(),
            skip_unchanged: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableStatus {
    Loaded,
    Unchanged,
    Failed(String),
}

impl TableStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TableStatus::Loaded => "loaded",
            TableStatus::Unchanged => "unchanged",
            TableStatus::Failed(_) => "failed",
        }
    }
}

fn serialize_millis<S: Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// Outcome for one table
#[derive(Debug, Clone, Serialize)]
pub struct TableReport {
    pub table: TableKind,
    pub source: PathBuf,
    pub status: TableStatus,
    pub rows_read: usize,
    pub rows_written: usize,
    pub rows_skipped: usize,
    /// Rows stored without their URL because another id already owns it
    pub urls_cleared: usize,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

impl TableReport {
    fn new(table: TableKind, source: &Path) -> Self {
        Self {
            table,
            source: source.to_path_buf(),
            status: TableStatus::Loaded,
            rows_read: 0,
            rows_written: 0,
            rows_skipped: 0,
            urls_cleared: 0,
            elapsed: Duration::ZERO,
        }
    }
}

/// Outcome for a whole run
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    pub tables: Vec<TableReport>,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

impl LoadReport {
    pub fn table(&self, kind: TableKind) -> Option<&TableReport> {
        self.tables.iter().find(|t| t.table == kind)
    }

    pub fn failed(&self) -> impl Iterator<Item = &TableReport> {
        self.tables
            .iter()
            .filter(|t| matches!(t.status, TableStatus::Failed(_)))
    }

    pub fn is_success(&self) -> bool {
        self.failed().next().is_none()
    }

    pub fn rows_written(&self) -> usize {
        self.tables.iter().map(|t| t.rows_written).sum()
    }
}

/// Loads a [`SourceSet`] through an [`Executor`]
pub struct Loader {
    db: Executor,
    options: LoadOptions,
    dims: Dimensions,
    progress: Option<Sender<ProgressMessage>>,
}

impl Loader {
    pub fn new(db: Executor, options: LoadOptions) -> Self {
        let db = db.with_batch_size(options.batch_size);
        Self {
            db,
            options,
            dims: Dimensions::default(),
            progress: None,
        }
    }

    pub fn with_progress(mut self, tx: Sender<ProgressMessage>) -> Self {
        self.progress = Some(tx);
        self
    }

    pub fn executor(&mut self) -> &mut Executor {
        &mut self.db
    }

    /// Create the schema, then load every table in `sources` parents-first.
    ///
    /// Only schema creation is fatal. Per-table problems end up in the report.
    pub fn run(&mut self, sources: &SourceSet) -> Result<LoadReport> {
        let started = Instant::now();
        self.db.ensure_schema()?;

        let mut report = LoadReport::default();
        for kind in load_order(&sources.kinds()) {
            let Some(path) = sources.get(kind) else { continue };
            let table = self.load_table(kind, path);
            match &table.status {
                TableStatus::Loaded => tracing::info!(
                    table = kind.table(),
                    rows = table.rows_written,
                    skipped = table.rows_skipped,
                    "Loaded {} rows into {}",
                    table.rows_written,
                    kind
                ),
                TableStatus::Unchanged => {
                    tracing::info!(table = kind.table(), "Skipping {}: source unchanged", kind)
                }
                TableStatus::Failed(reason) => {
                    tracing::error!(table = kind.table(), "Failed to load {}: {}", kind, reason)
                }
            }
            report.tables.push(table);
        }
        report.elapsed = started.elapsed();
        self.send(ProgressMessage::Exit);
        Ok(report)
    }

    fn load_table(&mut self, kind: TableKind, path: &Path) -> TableReport {
        let started = Instant::now();
        let mut report = TableReport::new(kind, path);
        if let Err(e) = self.try_load_table(kind, path, &mut report) {
            self.send(ProgressMessage::Error(format!("{}: {}", kind, e)));
            report.status = TableStatus::Failed(e.to_string());
        }
        self.send(ProgressMessage::TableFinished {
            table: kind.table().to_string(),
            ok: !matches!(report.status, TableStatus::Failed(_)),
        });
        report.elapsed = started.elapsed();
        report
    }

    fn try_load_table(&mut self, kind: TableKind, path: &Path, report: &mut TableReport) -> Result<()> {
        let hash = hash_file(path)?;
        if self.options.skip_unchanged
            && self.db.last_content_hash(kind.table())?.as_deref() == Some(hash.as_str())
        {
            report.status = TableStatus::Unchanged;
            return Ok(());
        }

        let frame = reader::read_frame(path, &kind.read_options(&self.options.list_delimiter))?;
        frame.require_columns(kind.table(), kind.required_columns())?;
        report.rows_read = frame.len();
        self.send(ProgressMessage::TableStarted {
            table: kind.table().to_string(),
            total: frame.len(),
        });

        let parents = self.parent_ids(kind)?;
        let mut claims = UrlClaims::load(&mut self.db, kind)?;

        self.db.begin()?;
        let written = self.write_batches(kind, &frame, &parents, &mut claims, report).and_then(|()| {
            self.db.record_ingest_run(
                kind.table(),
                &path.display().to_string(),
                &hash,
                report.rows_written as u64,
            )?;
            self.db.commit()
        });

        if let Err(e) = written {
            if let Err(rollback) = self.db.rollback() {
                tracing::warn!("Rollback of {} failed: {}", kind, rollback);
            }
            self.dims.clear();
            return Err(e);
        }
        Ok(())
    }

    fn write_batches(
        &mut self,
        kind: TableKind,
        frame: &reader::Frame,
        parents: &ParentIds,
        claims: &mut UrlClaims,
        report: &mut TableReport,
    ) -> Result<()> {
        let conflict = Conflict::Replace { key: kind.key() };
        let mut processed = 0;
        let mut pending = 0;

        for records in frame.batches(self.options.batch_size) {
            self.dims
                .resolve(&mut self.db, &DimensionNames::collect(kind, &records, parents))?;
            let batch = tables::map_batch(kind, &records, &self.dims, parents, claims);

            self.db
                .insert_rows(kind.table(), kind.columns(), &batch.facts, conflict)?;
            self.db.insert_rows(
                "issue_labels",
                &["issue_id", "label_id"],
                &batch.issue_labels,
                Conflict::Ignore,
            )?;
            self.db.insert_rows(
                "issue_assignees",
                &["issue_id", "user_id"],
                &batch.issue_assignees,
                Conflict::Ignore,
            )?;

            report.rows_written += batch.facts.len();
            report.rows_skipped += batch.skipped;
            report.urls_cleared += batch.urls_cleared;
            processed += records.len();
            self.send(ProgressMessage::Progress {
                table: kind.table().to_string(),
                current: processed,
            });

            pending += 1;
            if pending >= self.options.commit_every.max(1) {
                self.db.commit()?;
                self.db.begin()?;
                pending = 0;
            }
        }
        if report.rows_skipped > 0 {
            tracing::warn!(
                table = kind.table(),
                "Skipped {} {} rows without a key or parent",
                report.rows_skipped,
                kind
            );
        }
        if report.urls_cleared > 0 {
            tracing::warn!(
                table = kind.table(),
                "Stored {} {} rows without a URL already used by another id",
                report.urls_cleared,
                kind
            );
        }
        Ok(())
    }

    /// Snapshot the ids of every parent table before loading `kind`
    fn parent_ids(&mut self, kind: TableKind) -> Result<ParentIds> {
        let mut parents = HashMap::new();
        for parent in kind.parents() {
            let ids = self.db.existing_ids(parent.table(), parent.key())?;
            tracing::debug!("{} has {} existing {} ids", kind, ids.len(), parent);
            parents.insert(*parent, ids);
        }
        Ok(parents)
    }

    fn send(&self, msg: ProgressMessage) {
        if let Some(tx) = &self.progress {
            let _ = tx.send(msg);
        }
    }
}

/// blake3 of the file's bytes, hex-encoded
pub fn hash_file(path: &Path) -> Result<String> {
    let mut hasher = blake3::Hasher::new();
    hasher.update_reader(File::open(path)?)?;
    Ok(hasher.finalize().to_hex().to_string())
}
