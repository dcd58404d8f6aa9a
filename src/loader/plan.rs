//! What to load and in which order

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use serde::Serialize;
use crate::reader::{ReadOptions, SourceFormat};
use crate::{Error, Result};

/// A loadable fact table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    Repository,
    Issues,
    PullRequests,
    Comments,
    Commits,
}

impl TableKind {
    pub fn all() -> &'static [TableKind] {
        &[
            TableKind::Repository,
            TableKind::Issues,
            TableKind::PullRequests,
            TableKind::Comments,
            TableKind::Commits,
        ]
    }

    /// Target table, also the file stem used for discovery
    pub fn table(&self) -> &'static str {
        match self {
            TableKind::Repository => "repository",
            TableKind::Issues => "issues",
            TableKind::PullRequests => "pull_request",
            TableKind::Comments => "comments",
            TableKind::Commits => "commits",
        }
    }

    /// Tables whose rows this one references
    pub fn parents(&self) -> &'static [TableKind] {
        match self {
            TableKind::Repository | TableKind::Issues => &[],
            TableKind::PullRequests => &[TableKind::Repository],
            TableKind::Comments => &[TableKind::Issues],
            TableKind::Commits => &[TableKind::PullRequests],
        }
    }

    /// Primary key column in the target table
    pub fn key(&self) -> &'static str {
        match self {
            TableKind::Commits => "sha",
            _ => "id",
        }
    }

    /// Target columns, in insert order
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            TableKind::Repository => &[
                "id", "name", "full_name", "owner_id", "description", "url", "stars", "forks",
                "created_at", "updated_at",
            ],
            TableKind::Issues => &[
                "id", "number", "title", "state", "author_id", "created_at", "updated_at",
                "closed_at", "comments_count", "url",
            ],
            TableKind::PullRequests => &[
                "id", "number", "title", "state", "author_id", "repository_id", "created_at",
                "updated_at", "closed_at", "merged_at", "url",
            ],
            TableKind::Comments => &["id", "issue_id", "author_id", "body", "created_at", "updated_at"],
            TableKind::Commits => &["sha", "pull_request_id", "author_id", "message", "committed_at"],
        }
    }

    /// Source columns that must be present for the file to load at all
    pub fn required_columns(&self) -> &'static [&'static str] {
        match self {
            TableKind::Comments => &["ID", "ISSUE_ID"],
            TableKind::Commits => &["SHA"],
            _ => &["ID"],
        }
    }

    pub fn read_options(&self, list_delimiter: &str) -> ReadOptions {
        let options = match self {
            TableKind::Repository => ReadOptions::new(&["CREATED_AT", "UPDATED_AT"], &[]),
            TableKind::Issues => ReadOptions::new(
                &["CREATED_AT", "UPDATED_AT", "CLOSED_AT"],
                &["LABELS", "ASSIGNEES"],
            ),
            TableKind::PullRequests => ReadOptions::new(
                &["CREATED_AT", "UPDATED_AT", "CLOSED_AT", "MERGED_AT"],
                &[],
            ),
            TableKind::Comments => ReadOptions::new(&["CREATED_AT", "UPDATED_AT"], &[]),
            TableKind::Commits => ReadOptions::new(&["COMMITTED_AT"], &[]),
        };
        options.with_delimiter(list_delimiter)
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.table())
    }
}

impl FromStr for TableKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "repository" | "repositories" | "repo" => Ok(TableKind::Repository),
            "issues" | "issue" => Ok(TableKind::Issues),
            "pull_request" | "pull_requests" | "pull-requests" | "pr" => Ok(TableKind::PullRequests),
            "comments" | "comment" => Ok(TableKind::Comments),
            "commits" | "commit" => Ok(TableKind::Commits),
            _ => Err(Error::UnknownTable(s.to_string())),
        }
    }
}

/// Order `requested` so every parent comes before its children.
///
/// Ties keep the order of [`TableKind::all`]. Parents that were not
/// requested are not added.
pub fn load_order(requested: &[TableKind]) -> Vec<TableKind> {
    let wanted: Vec<TableKind> = TableKind::all()
        .iter()
        .copied()
        .filter(|k| requested.contains(k))
        .collect();

    let mut in_degree: HashMap<TableKind, usize> = wanted
        .iter()
        .map(|k| (*k, k.parents().iter().filter(|p| wanted.contains(p)).count()))
        .collect();

    let mut order = Vec::with_capacity(wanted.len());
    while order.len() < wanted.len() {
        let Some(next) = wanted
            .iter()
            .copied()
            .find(|k| in_degree.get(k) == Some(&0))
        else {
            break;
        };
        in_degree.remove(&next);
        for child in &wanted {
            if child.parents().contains(&next) {
                if let Some(d) = in_degree.get_mut(child) {
                    *d -= 1;
                }
            }
        }
        order.push(next);
    }
    order
}

/// Source files keyed by table
#[derive(Debug, Clone, Default)]
pub struct SourceSet {
    files: BTreeMap<TableKind, PathBuf>,
}

impl SourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, kind: TableKind, path: impl Into<PathBuf>) -> Self {
        self.insert(kind, path);
        self
    }

    pub fn insert(&mut self, kind: TableKind, path: impl Into<PathBuf>) {
        self.files.insert(kind, path.into());
    }

    /// Find `<stem>.{csv,tsv,parquet,pq}` for each table under `data_dir`.
    /// The first extension that matches wins.
    pub fn discover(data_dir: &Path) -> Result<Self> {
        if !data_dir.is_dir() {
            return Err(Error::Config(format!(
                "data directory not found: {}",
                data_dir.display()
            )));
        }
        let base = glob::Pattern::escape(&data_dir.display().to_string());

        let mut set = Self::new();
        for kind in TableKind::all() {
            for ext in SourceFormat::EXTENSIONS {
                let pattern = format!("{}/{}.{}", base, kind.table(), ext);
                let found = glob::glob(&pattern)
                    .map_err(|e| Error::Config(format!("bad source pattern {}: {}", pattern, e)))?
                    .filter_map(|entry| entry.ok())
                    .find(|p| p.is_file());
                if let Some(path) = found {
                    tracing::debug!("Found {} source at {}", kind, path.display());
                    set.insert(*kind, path);
                    break;
                }
            }
        }
        Ok(set)
    }

    /// Overlay explicit paths on top of discovered ones
    pub fn merge(&mut self, other: SourceSet) {
        self.files.extend(other.files);
    }

    pub fn get(&self, kind: TableKind) -> Option<&Path> {
        self.files.get(&kind).map(PathBuf::as_path)
    }

    pub fn kinds(&self) -> Vec<TableKind> {
        self.files.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_order_puts_parents_first() {
        let order = load_order(&[
            TableKind::Commits,
            TableKind::Comments,
            TableKind::PullRequests,
            TableKind::Issues,
            TableKind::Repository,
        ]);
        assert_eq!(order, TableKind::all());
        for (i, kind) in order.iter().enumerate() {
            for parent in kind.parents() {
                let pos = order.iter().position(|k| k == parent).unwrap();
                assert!(pos < i, "{} must load before {}", parent, kind);
            }
        }
    }

    #[test]
    fn test_load_order_skips_unrequested_parents() {
        assert_eq!(
            load_order(&[TableKind::Commits, TableKind::Issues]),
            vec![TableKind::Issues, TableKind::Commits]
        );
        assert!(load_order(&[]).is_empty());
    }

    #[test]
    fn test_table_kind_from_str() {
        assert_eq!("pull_requests".parse::<TableKind>().unwrap(), TableKind::PullRequests);
        assert_eq!("Issues".parse::<TableKind>().unwrap(), TableKind::Issues);
        assert!(matches!("users".parse::<TableKind>(), Err(Error::UnknownTable(_))));
    }

    #[test]
    fn test_columns_start_with_key() {
        for kind in TableKind::all() {
            assert_eq!(kind.columns()[0], kind.key());
        }
    }

    #[test]
    fn test_discover_sources() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("issues.csv"), "ID\n1\n").unwrap();
        std::fs::write(dir.path().join("comments.parquet"), b"").unwrap();
        std::fs::write(dir.path().join("notes.csv"), "ID\n").unwrap();

        let set = SourceSet::discover(dir.path()).unwrap();
        assert_eq!(set.kinds(), vec![TableKind::Issues, TableKind::Comments]);
        assert!(set.get(TableKind::Issues).unwrap().ends_with("issues.csv"));
        assert!(set.get(TableKind::Repository).is_none());
    }

    #[test]
    fn test_discover_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(SourceSet::discover(&dir.path().join("absent")).is_err());
    }

    #[test]
    fn test_explicit_paths_override_discovery() {
        let mut set = SourceSet::new().with(TableKind::Issues, "a/issues.csv");
        set.merge(SourceSet::new().with(TableKind::Issues, "b/issues.tsv"));
        assert_eq!(set.get(TableKind::Issues), Some(Path::new("b/issues.tsv")));
        assert_eq!(set.len(), 1);
    }
}
