//! Record-to-row mapping for each fact table

use std::collections::{BTreeSet, HashMap, HashSet};
use crate::reader::Record;
use crate::storage::{Executor, SqlValue};
use crate::Result;
use super::TableKind;

/// Names of the `users` and `labels` a batch refers to
#[derive(Debug, Default)]
pub struct DimensionNames {
    pub users: BTreeSet<String>,
    pub labels: BTreeSet<String>,
}

impl DimensionNames {
    /// Names from the records that will actually be written
    pub fn collect(kind: TableKind, records: &[Record<'_>], parents: &ParentIds) -> Self {
        let mut names = Self::default();
        for r in records.iter().filter(|r| admissible(kind, r, parents)) {
            let author = match kind {
                TableKind::Repository => r.text("OWNER"),
                _ => r.text("AUTHOR"),
            };
            names.users.extend(author);
            if kind == TableKind::Issues {
                names.users.extend(r.list("ASSIGNEES"));
                names.labels.extend(r.list("LABELS"));
            }
        }
        names
    }
}

/// Name-to-id cache for the dimension tables.
///
/// Must be cleared after a rollback: ids handed out inside the rolled-back
/// transaction no longer exist.
#[derive(Debug, Default)]
pub struct Dimensions {
    users: HashMap<String, i64>,
    labels: HashMap<String, i64>,
}

impl Dimensions {
    /// Upsert every name not already cached
    pub fn resolve(&mut self, db: &mut Executor, names: &DimensionNames) -> Result<()> {
        let users: Vec<String> = names
            .users
            .iter()
            .filter(|n| !self.users.contains_key(*n))
            .cloned()
            .collect();
        self.users.extend(db.upsert_names("users", &users)?);

        let labels: Vec<String> = names
            .labels
            .iter()
            .filter(|n| !self.labels.contains_key(*n))
            .cloned()
            .collect();
        self.labels.extend(db.upsert_names("labels", &labels)?);
        Ok(())
    }

    pub fn user(&self, name: Option<String>) -> Option<i64> {
        name.and_then(|n| self.users.get(&n).copied())
    }

    pub fn label(&self, name: &str) -> Option<i64> {
        self.labels.get(name).copied()
    }

    pub fn clear(&mut self) {
        self.users.clear();
        self.labels.clear();
    }
}

/// Owners of `issues.url`, which is unique.
///
/// Seeded from the table before loading. A URL stays with the first id that
/// claims it; any other id with the same URL is stored with a NULL URL.
#[derive(Debug, Default)]
pub struct UrlClaims {
    owners: HashMap<String, i64>,
}

impl UrlClaims {
    pub fn load(db: &mut Executor, kind: TableKind) -> Result<Self> {
        if kind != TableKind::Issues {
            return Ok(Self::default());
        }
        Ok(Self {
            owners: db.column_owners(kind.table(), "url", kind.key())?,
        })
    }

    /// Whether `id` may store `url`
    fn claim(&mut self, id: i64, url: &str) -> bool {
        match self.owners.get(url) {
            Some(&owner) => owner == id,
            None => {
                self.owners.insert(url.to_string(), id);
                true
            }
        }
    }
}

/// Ids already present in each parent table
pub type ParentIds = HashMap<TableKind, HashSet<i64>>;

/// Rows ready to insert for one batch
#[derive(Debug, Default)]
pub struct MappedBatch {
    pub facts: Vec<Vec<SqlValue>>,
    pub issue_labels: Vec<Vec<SqlValue>>,
    pub issue_assignees: Vec<Vec<SqlValue>>,
    pub skipped: usize,
    /// Rows written with a NULL URL because another id owns it
    pub urls_cleared: usize,
    positions: HashMap<String, usize>,
    label_links: BTreeSet<(i64, i64)>,
    assignee_links: BTreeSet<(i64, i64)>,
}

impl MappedBatch {
    /// Add a fact row; a later row with the same key replaces the earlier one
    fn push(&mut self, key: String, row: Vec<SqlValue>) {
        match self.positions.get(&key) {
            Some(&i) => self.facts[i] = row,
            None => {
                self.positions.insert(key, self.facts.len());
                self.facts.push(row);
            }
        }
    }

    fn finish(mut self) -> Self {
        self.issue_labels = link_rows(&self.label_links);
        self.issue_assignees = link_rows(&self.assignee_links);
        self
    }
}

fn link_rows(links: &BTreeSet<(i64, i64)>) -> Vec<Vec<SqlValue>> {
    links
        .iter()
        .map(|(a, b)| vec![SqlValue::Integer(*a), SqlValue::Integer(*b)])
        .collect()
}

/// Map a batch of source records to rows for `kind`.
///
/// Rows without a usable key are skipped, as are rows whose required
/// parent does not exist. Missing optional parents become NULL.
pub fn map_batch(
    kind: TableKind,
    records: &[Record<'_>],
    dims: &Dimensions,
    parents: &ParentIds,
    claims: &mut UrlClaims,
) -> MappedBatch {
    let mut batch = MappedBatch::default();
    for r in records {
        let mapped = match kind {
            TableKind::Repository => map_repository(r, dims, &mut batch),
            TableKind::Issues => map_issue(r, dims, claims, &mut batch),
            TableKind::PullRequests => map_pull_request(r, dims, parents, &mut batch),
            TableKind::Comments => map_comment(r, dims, parents, &mut batch),
            TableKind::Commits => map_commit(r, dims, parents, &mut batch),
        };
        if mapped.is_none() {
            batch.skipped += 1;
        }
    }
    batch.finish()
}

/// Whether a record has a key and, where one is required, a parent
fn admissible(kind: TableKind, r: &Record<'_>, parents: &ParentIds) -> bool {
    match kind {
        TableKind::Commits => r.text("SHA").is_some(),
        TableKind::Comments => {
            r.int("ID").is_some()
                && optional_parent(parents, TableKind::Issues, r.int("ISSUE_ID")).is_some()
        }
        _ => r.int("ID").is_some(),
    }
}

/// Keep `id` only if the parent table has it
fn optional_parent(parents: &ParentIds, kind: TableKind, id: Option<i64>) -> Option<i64> {
    id.filter(|id| parents.get(&kind).is_some_and(|ids| ids.contains(id)))
}

fn map_repository(r: &Record<'_>, dims: &Dimensions, batch: &mut MappedBatch) -> Option<()> {
    let id = r.int("ID")?;
    let full_name = r.text("FULL_NAME");
    let name = r
        .text("NAME")
        .or_else(|| {
            full_name
                .as_deref()
                .and_then(|f| f.rsplit('/').next())
                .filter(|n| !n.is_empty())
                .map(String::from)
        })
        .unwrap_or_else(|| format!("repository-{}", id));

    batch.push(
        id.to_string(),
        vec![
            id.into(),
            name.into(),
            full_name.into(),
            dims.user(r.text("OWNER")).into(),
            r.text("DESCRIPTION").into(),
            r.text("URL").into(),
            r.int("STARS").into(),
            r.int("FORKS").into(),
            r.timestamp("CREATED_AT").into(),
            r.timestamp("UPDATED_AT").into(),
        ],
    );
    Some(())
}

fn map_issue(
    r: &Record<'_>,
    dims: &Dimensions,
    claims: &mut UrlClaims,
    batch: &mut MappedBatch,
) -> Option<()> {
    let id = r.int("ID")?;
    let title = r.text("TITLE").unwrap_or_else(|| format!("Issue {}", id));
    let url = match r.text("URL") {
        Some(url) if !claims.claim(id, &url) => {
            tracing::debug!("Issue {} reuses {}; storing it without a URL", id, url);
            batch.urls_cleared += 1;
            None
        }
        url => url,
    };

    batch.push(
        id.to_string(),
        vec![
            id.into(),
            r.int("NUMBER").into(),
            title.into(),
            r.text("STATE").into(),
            dims.user(r.text("AUTHOR")).into(),
            r.timestamp("CREATED_AT").into(),
            r.timestamp("UPDATED_AT").into(),
            r.timestamp("CLOSED_AT").into(),
            r.int("COMMENTS").into(),
            url.into(),
        ],
    );

    for label in r.list("LABELS") {
        if let Some(label_id) = dims.label(&label) {
            batch.label_links.insert((id, label_id));
        }
    }
    for assignee in r.list("ASSIGNEES") {
        if let Some(user_id) = dims.user(Some(assignee)) {
            batch.assignee_links.insert((id, user_id));
        }
    }
    Some(())
}

fn map_pull_request(
    r: &Record<'_>,
    dims: &Dimensions,
    parents: &ParentIds,
    batch: &mut MappedBatch,
) -> Option<()> {
    let id = r.int("ID")?;
    let title = r.text("TITLE").unwrap_or_else(|| format!("Pull request {}", id));
    let repository_id = optional_parent(parents, TableKind::Repository, r.int("REPOSITORY_ID"));

    batch.push(
        id.to_string(),
        vec![
            id.into(),
            r.int("NUMBER").into(),
            title.into(),
            r.text("STATE").into(),
            dims.user(r.text("AUTHOR")).into(),
            repository_id.into(),
            r.timestamp("CREATED_AT").into(),
            r.timestamp("UPDATED_AT").into(),
            r.timestamp("CLOSED_AT").into(),
            r.timestamp("MERGED_AT").into(),
            r.text("URL").into(),
        ],
    );
    Some(())
}

fn map_comment(
    r: &Record<'_>,
    dims: &Dimensions,
    parents: &ParentIds,
    batch: &mut MappedBatch,
) -> Option<()> {
    let id = r.int("ID")?;
    let issue_id = optional_parent(parents, TableKind::Issues, r.int("ISSUE_ID"))?;

    batch.push(
        id.to_string(),
        vec![
            id.into(),
            issue_id.into(),
            dims.user(r.text("AUTHOR")).into(),
            r.raw_text("BODY").into(),
            r.timestamp("CREATED_AT").into(),
            r.timestamp("UPDATED_AT").into(),
        ],
    );
    Some(())
}

fn map_commit(
    r: &Record<'_>,
    dims: &Dimensions,
    parents: &ParentIds,
    batch: &mut MappedBatch,
) -> Option<()> {
    let sha = r.text("SHA")?;
    let pull_request_id = optional_parent(parents, TableKind::PullRequests, r.int("PULL_REQUEST_ID"));

    batch.push(
        sha.clone(),
        vec![
            sha.into(),
            pull_request_id.into(),
            dims.user(r.text("AUTHOR")).into(),
            r.raw_text("MESSAGE").into(),
            r.timestamp("COMMITTED_AT").into(),
        ],
    );
    Some(())
}
