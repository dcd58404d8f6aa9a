//! The seam between the executor and a concrete database driver

use super::{Dialect, SqlValue};
use crate::Result;
use serde_json::{Map, Value};

/// Result set of an ad-hoc query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
}

impl QueryRows {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Rows as `[{column: value}, …]`, the shape agents receive
    pub fn to_json(&self) -> Value {
        let objects = self
            .rows
            .iter()
            .map(|row| {
                let mut obj = Map::new();
                for (column, value) in self.columns.iter().zip(row) {
                    obj.insert(column.clone(), serde_json::to_value(value).unwrap_or(Value::Null));
                }
                Value::Object(obj)
            })
            .collect();
        Value::Array(objects)
    }
}

/// A connection that can run statements for one SQL dialect.
///
/// Transactions are explicit (`begin`/`commit`/`rollback`) so the loader can
/// commit periodically inside a long table load.
pub trait Backend {
    fn dialect(&self) -> Dialect;

    /// Run one or more statements without parameters
    fn execute_script(&mut self, sql: &str) -> Result<()>;

    /// Run a statement and return the number of affected rows
    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64>;

    /// Run a statement and collect every row
    fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<QueryRows>;

    fn begin(&mut self) -> Result<()> {
        self.execute_script("BEGIN")
    }

    fn commit(&mut self) -> Result<()> {
        self.execute_script("COMMIT")
    }

    fn rollback(&mut self) -> Result<()> {
        self.execute_script("ROLLBACK")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_to_json_objects() {
        let rows = QueryRows {
            columns: vec!["id".into(), "name".into()],
            rows: vec![
                vec![SqlValue::Integer(1), SqlValue::Text("octocat".into())],
                vec![SqlValue::Integer(2), SqlValue::Null],
            ],
        };
        let json = rows.to_json();
        assert_eq!(json[0]["name"], "octocat");
        assert_eq!(json[1]["id"], 2);
        assert!(json[1]["name"].is_null());
    }
}
