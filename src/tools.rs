//! Tools an agent can call
//!
//! Each tool is described by a [`ToolSpec`] (name, description, JSON input
//! schema) and invoked with JSON arguments. Tool failures come back as an
//! `Error …` string so the agent can read them and retry.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use crate::storage::schema::schema_text;
use crate::storage::{DatabaseTarget, QueryRows};
use crate::{Error, Result};

/// What an agent sees when it lists tools
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[derive(Debug, Deserialize)]
struct SqlQueryArgs {
    query: String,
}

/// Runs read-only SQL against the issue database
#[derive(Debug, Clone)]
pub struct SqlQueryTool {
    target: DatabaseTarget,
}

impl SqlQueryTool {
    pub const NAME: &'static str = "sql_query_executor";

    pub fn new(target: DatabaseTarget) -> Self {
        Self { target }
    }

    pub fn target(&self) -> &DatabaseTarget {
        &self.target
    }

    pub fn spec(&self) -> ToolSpec {
        let dialect = self.target.dialect();
        ToolSpec {
            name: Self::NAME.to_string(),
            description: format!(
                "Execute a SQL query against the GitHub issues database ({}) and return the \
                 results as JSON. The connection is read-only. The database schema is:\n\
                 ```sql\n{}```",
                dialect,
                schema_text(dialect)
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The SQL query to execute"
                    }
                },
                "required": ["query"]
            }),
        }
    }

    /// Run `query` on a read-only connection and return the rows as
    /// pretty-printed JSON objects
    pub fn run(&self, query: &str) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.query_json(query)?)?)
    }

    /// Same as [`SqlQueryTool::run`] without the final rendering
    pub fn query_json(&self, query: &str) -> Result<Value> {
        Ok(self.query_rows(query)?.to_json())
    }

    /// Run `query` on a read-only connection
    pub fn query_rows(&self, query: &str) -> Result<QueryRows> {
        if query.trim().is_empty() {
            return Err(Error::ToolArgs("query is empty".to_string()));
        }
        tracing::info!(
            tool_name = Self::NAME,
            role = Self::NAME,
            "Executing SQL query: {}",
            query
        );
        let mut db = self.target.open_read_only()?;
        let rows = db.query(query, &[])?;
        tracing::debug!(tool_name = Self::NAME, rows = rows.len(), "query returned");
        Ok(rows)
    }

    /// Agent-facing entry point: JSON arguments in, text out
    pub fn call(&self, args: &Value) -> String {
        let result = serde_json::from_value::<SqlQueryArgs>(args.clone())
            .map_err(|e| Error::ToolArgs(e.to_string()))
            .and_then(|args| self.run(&args.query));
        match result {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(tool_name = Self::NAME, role = Self::NAME, "Tool call failed: {}", e);
                format!("Error executing SQL query: {}", e)
            }
        }
    }
}
