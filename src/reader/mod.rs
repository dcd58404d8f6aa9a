//! Tabular reader
//!
//! Reads CSV and Parquet snapshots into an in-memory [`Frame`], then
//! normalizes date columns into UTC timestamps and delimiter-separated
//! columns into lists.

pub mod csv_source;
pub mod normalize;
pub mod parquet_source;

use std::collections::HashMap;
use std::path::Path;
use chrono::{DateTime, Utc};
use crate::storage::value::format_timestamp;
use crate::{Error, Result};

/// Default separator for list columns such as `LABELS` and `ASSIGNEES`
pub const DEFAULT_LIST_DELIMITER: &str = ";";

/// One cell of a frame
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Timestamp(DateTime<Utc>),
    List(Vec<String>),
}

/// Source file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    Tsv,
    Parquet,
}

impl SourceFormat {
    /// Extensions recognized by [`SourceFormat::from_path`]
    pub const EXTENSIONS: &'static [&'static str] = &["csv", "tsv", "parquet", "pq"];

    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "csv" => Ok(SourceFormat::Csv),
            "tsv" => Ok(SourceFormat::Tsv),
            "parquet" | "pq" => Ok(SourceFormat::Parquet),
            _ => Err(Error::UnsupportedSource(path.display().to_string())),
        }
    }
}

/// How to normalize a frame after reading
#[derive(Debug, Clone)]
pub struct ReadOptions {
    pub date_columns: Vec<String>,
    pub list_columns: Vec<String>,
    pub list_delimiter: String,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            date_columns: Vec::new(),
            list_columns: Vec::new(),
            list_delimiter: DEFAULT_LIST_DELIMITER.to_string(),
        }
    }
}

impl ReadOptions {
    pub fn new(date_columns: &[&str], list_columns: &[&str]) -> Self {
        Self {
            date_columns: date_columns.iter().map(|c| c.to_string()).collect(),
            list_columns: list_columns.iter().map(|c| c.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn with_delimiter(mut self, delimiter: &str) -> Self {
        self.list_delimiter = delimiter.to_string();
        self
    }
}

/// Read and normalize a tabular source
pub fn read_frame(path: &Path, options: &ReadOptions) -> Result<Frame> {
    let mut frame = match SourceFormat::from_path(path)? {
        SourceFormat::Csv => csv_source::read_csv(path, b',')?,
        SourceFormat::Tsv => csv_source::read_csv(path, b'\t')?,
        SourceFormat::Parquet => parquet_source::read_parquet(path)?,
    };
    frame.normalize(options);
    tracing::debug!(
        path = %path.display(),
        rows = frame.len(),
        columns = frame.columns().len(),
        "read tabular source"
    );
    Ok(frame)
}

/// Column names plus rows of cells. Column lookup ignores case.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    columns: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<Vec<Cell>>,
}

impl Frame {
    pub fn new(columns: Vec<String>) -> Self {
        let index = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.to_lowercase(), i))
            .collect();
        Self { columns, index, rows: Vec::new() }
    }

    /// Append a row, padding or truncating it to the column count
    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.columns.len(), Cell::Null);
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.index.get(&name.to_lowercase()).copied()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Fail with `MissingColumn` unless every named column is present
    pub fn require_columns(&self, table: &str, columns: &[&str]) -> Result<()> {
        for column in columns {
            if !self.has_column(column) {
                return Err(Error::MissingColumn {
                    table: table.to_string(),
                    column: column.to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn records(&self) -> impl Iterator<Item = Record<'_>> {
        self.rows.iter().map(move |cells| Record { frame: self, cells })
    }

    /// Contiguous groups of at most `size` records
    pub fn batches(&self, size: usize) -> impl Iterator<Item = Vec<Record<'_>>> {
        self.rows
            .chunks(size.max(1))
            .map(move |chunk| chunk.iter().map(|cells| Record { frame: self, cells }).collect())
    }

    fn normalize(&mut self, options: &ReadOptions) {
        let dates: Vec<usize> = options
            .date_columns
            .iter()
            .filter_map(|c| self.column_index(c))
            .collect();
        let lists: Vec<usize> = options
            .list_columns
            .iter()
            .filter_map(|c| self.column_index(c))
            .collect();

        for row in &mut self.rows {
            for &i in &dates {
                row[i] = to_timestamp(std::mem::replace(&mut row[i], Cell::Null));
            }
            for &i in &lists {
                row[i] = to_list(std::mem::replace(&mut row[i], Cell::Null), &options.list_delimiter);
            }
        }
    }
}

fn to_timestamp(cell: Cell) -> Cell {
    let parsed = match cell {
        Cell::Timestamp(ts) => Some(ts),
        Cell::Text(s) => normalize::parse_timestamp(&s),
        Cell::Int(secs) => DateTime::from_timestamp(secs, 0),
        _ => None,
    };
    parsed.map(Cell::Timestamp).unwrap_or(Cell::Null)
}

fn to_list(cell: Cell, delimiter: &str) -> Cell {
    let items = match cell {
        Cell::List(items) => items
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        Cell::Text(s) => normalize::split_list(&s, delimiter),
        Cell::Null => Vec::new(),
        other => vec![cell_text(&other).unwrap_or_default()],
    };
    Cell::List(items)
}

fn cell_text(cell: &Cell) -> Option<String> {
    match cell {
        Cell::Null => None,
        Cell::Text(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Cell::Int(v) => Some(v.to_string()),
        Cell::Float(v) => Some(v.to_string()),
        Cell::Bool(v) => Some(v.to_string()),
        Cell::Timestamp(ts) => Some(format_timestamp(ts)),
        Cell::List(items) => (!items.is_empty()).then(|| items.join(DEFAULT_LIST_DELIMITER)),
    }
}

/// A borrowed row with typed accessors. Missing columns read as NULL.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    frame: &'a Frame,
    cells: &'a [Cell],
}

impl<'a> Record<'a> {
    pub fn cell(&self, column: &str) -> &'a Cell {
        const NULL: &Cell = &Cell::Null;
        self.frame
            .column_index(column)
            .and_then(|i| self.cells.get(i))
            .unwrap_or(NULL)
    }

    /// Trimmed text; empty strings read as `None`
    pub fn text(&self, column: &str) -> Option<String> {
        cell_text(self.cell(column))
    }

    /// Text exactly as written, for bodies and messages; blank reads as `None`
    pub fn raw_text(&self, column: &str) -> Option<String> {
        match self.cell(column) {
            Cell::Text(s) if s.trim().is_empty() => None,
            Cell::Text(s) => Some(s.clone()),
            other => cell_text(other),
        }
    }

    pub fn int(&self, column: &str) -> Option<i64> {
        match self.cell(column) {
            Cell::Int(v) => Some(*v),
            Cell::Float(v) => normalize::float_to_int(*v),
            Cell::Text(s) => normalize::parse_int(s),
            Cell::Bool(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    pub fn timestamp(&self, column: &str) -> Option<DateTime<Utc>> {
        match self.cell(column) {
            Cell::Timestamp(ts) => Some(*ts),
            Cell::Text(s) => normalize::parse_timestamp(s),
            _ => None,
        }
    }

    pub fn list(&self, column: &str) -> Vec<String> {
        match to_list(self.cell(column).clone(), DEFAULT_LIST_DELIMITER) {
            Cell::List(items) => items,
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_source_format_from_extension() {
        assert_eq!(SourceFormat::from_path(Path::new("a.CSV")).unwrap(), SourceFormat::Csv);
        assert_eq!(SourceFormat::from_path(Path::new("a.pq")).unwrap(), SourceFormat::Parquet);
        assert!(matches!(
            SourceFormat::from_path(Path::new("a.xlsx")),
            Err(Error::UnsupportedSource(_))
        ));
    }

    #[test]
    fn test_read_and_normalize_issue_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "issues.csv",
            "ID,NUMBER,TITLE,CREATED_AT,CLOSED_AT,LABELS,ASSIGNEES\n\
             1,10,First,2023-01-02 03:04:05,,bug; ui,alice\n\
             2,11.0,Second,garbage,2023-02-01T00:00:00Z,,\n",
        );
        let options = ReadOptions::new(&["CREATED_AT", "CLOSED_AT"], &["LABELS", "ASSIGNEES"]);
        let frame = read_frame(&path, &options).unwrap();
        assert_eq!(frame.len(), 2);

        let records: Vec<_> = frame.records().collect();
        assert_eq!(records[0].list("labels"), vec!["bug", "ui"]);
        assert_eq!(records[0].list("ASSIGNEES"), vec!["alice"]);
        assert!(records[0].timestamp("CREATED_AT").is_some());
        assert!(records[0].timestamp("CLOSED_AT").is_none());

        assert_eq!(records[1].int("NUMBER"), Some(11));
        assert_eq!(records[1].cell("CREATED_AT"), &Cell::Null);
        assert!(records[1].list("LABELS").is_empty());
    }

    #[test]
    fn test_missing_column_reads_as_null() {
        let mut frame = Frame::new(vec!["ID".into()]);
        frame.push_row(vec![Cell::Int(1)]);
        let record = frame.records().next().unwrap();
        assert_eq!(record.int("id"), Some(1));
        assert_eq!(record.text("TITLE"), None);
        assert!(frame.require_columns("issues", &["ID"]).is_ok());
        assert!(matches!(
            frame.require_columns("issues", &["ID", "TITLE"]),
            Err(Error::MissingColumn { .. })
        ));
    }

    #[test]
    fn test_batches_cover_all_rows() {
        let mut frame = Frame::new(vec!["ID".into()]);
        for i in 0..7 {
            frame.push_row(vec![Cell::Int(i)]);
        }
        let sizes: Vec<usize> = frame.batches(3).map(|b| b.len()).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
    }

    #[test]
    fn test_text_trims_and_drops_empty() {
        let mut frame = Frame::new(vec!["STATE".into()]);
        frame.push_row(vec![Cell::Text("  open ".into())]);
        frame.push_row(vec![Cell::Text("   ".into())]);
        let records: Vec<_> = frame.records().collect();
        assert_eq!(records[0].text("state").as_deref(), Some("open"));
        assert_eq!(records[1].text("state"), None);
    }

    #[test]
    fn test_raw_text_keeps_surrounding_whitespace() {
        let mut frame = Frame::new(vec!["BODY".into()]);
        frame.push_row(vec![Cell::Text("    let x = 1;\n".into())]);
        frame.push_row(vec![Cell::Text(" \n ".into())]);
        let records: Vec<_> = frame.records().collect();
        assert_eq!(records[0].raw_text("body").as_deref(), Some("    let x = 1;\n"));
        assert_eq!(records[1].raw_text("body"), None);
    }
}
