use tabled::{builder::Builder, settings::Style, Table, Tabled};
use crate::storage::{DbStats, QueryRows};

#[derive(Tabled)]
pub struct TableRow {
    #[tabled(rename = "Table")]
    pub metric: String,
    #[tabled(rename = "Rows")]
    pub value: String,
}

#[derive(Default)]
pub struct TableBuilder {
    rows: Vec<TableRow>,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_row(&mut self, label: &str, value: &str) {
        self.rows.push(TableRow {
            metric: label.to_string(),
            value: value.to_string(),
        });
    }

    pub fn build(&self) -> String {
        if self.rows.is_empty() {
            return String::new();
        }

        Table::new(&self.rows).with(Style::rounded()).to_string()
    }
}

pub fn stats_table(stats: &DbStats) -> String {
    let mut builder = TableBuilder::new();
    for t in &stats.tables {
        builder.add_row(&t.table, &t.rows.to_string());
    }
    builder.build()
}

/// Render a result set with one column per SQL column
pub fn rows_table(rows: &QueryRows) -> String {
    let mut builder = Builder::default();
    builder.push_record(rows.columns.iter().cloned());
    for row in &rows.rows {
        builder.push_record(row.iter().map(|v| v.display()));
    }
    builder.build().with(Style::rounded()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Dialect, SqlValue, TableCount};

    #[test]
    fn test_stats_table_lists_every_table() {
        let stats = DbStats {
            dialect: Dialect::Sqlite,
            tables: vec![
                TableCount { table: "issues".into(), rows: 12 },
                TableCount { table: "users".into(), rows: 3 },
            ],
        };
        let out = stats_table(&stats);
        assert!(out.contains("issues") && out.contains("12"));
        assert!(out.contains("Rows"));
    }

    #[test]
    fn test_rows_table_renders_nulls() {
        let rows = QueryRows {
            columns: vec!["id".into(), "closed_at".into()],
            rows: vec![vec![SqlValue::Integer(1), SqlValue::Null]],
        };
        let out = rows_table(&rows);
        assert!(out.contains("closed_at"));
        assert!(out.contains("NULL"));
    }
}
