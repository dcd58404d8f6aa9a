use axum::{
    extract::State,
    Json,
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use crate::server::AppState;
use crate::storage::schema::schema_text;
use std::sync::Arc;

#[derive(Deserialize)]
pub struct QueryBody {
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiResult = Result<Json<Value>, (StatusCode, Json<ErrorResponse>)>;

fn error(status: StatusCode, message: impl ToString) -> (StatusCode, Json<ErrorResponse>) {
    (status, Json(ErrorResponse { error: message.to_string() }))
}

pub async fn list_tools(State(state): State<Arc<AppState>>) -> ApiResult {
    Ok(Json(json!([state.tool.spec()])))
}

pub async fn run_sql_query(
    State(state): State<Arc<AppState>>,
    Json(body): Json<QueryBody>,
) -> ApiResult {
    let tool = state.tool.clone();
    let rows = tokio::task::spawn_blocking(move || tool.query_json(&body.query))
        .await
        .map_err(|e| error(StatusCode::INTERNAL_SERVER_ERROR, e))?
        .map_err(|e| error(StatusCode::BAD_REQUEST, e))?;

    Ok(Json(rows))
}

pub async fn get_stats(State(state): State<Arc<AppState>>) -> ApiResult {
    let target = state.tool.target().clone();
    let stats = tokio::task::spawn_blocking(move || target.open_read_only()?.stats())
        .await
        .map_err(|e| error(StatusCode::INTERNAL_SERVER_ERROR, e))?
        .map_err(|e| error(StatusCode::INTERNAL_SERVER_ERROR, e))?;

    serde_json::to_value(&stats)
        .map(Json)
        .map_err(|e| error(StatusCode::INTERNAL_SERVER_ERROR, e))
}

pub async fn get_schema(State(state): State<Arc<AppState>>) -> ApiResult {
    let dialect = state.tool.target().dialect();
    Ok(Json(json!({
        "dialect": dialect,
        "schema": schema_text(dialect),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::DatabaseTarget;
    use crate::tools::SqlQueryTool;
    use crate::server::AppState;

    fn state() -> (tempfile::TempDir, Arc<AppState>) {
        let dir = tempfile::tempdir().unwrap();
        let target = DatabaseTarget::Sqlite(dir.path().join("issues.sqlite"));
        let mut db = target.open().unwrap();
        db.ensure_schema().unwrap();
        drop(db);
        (dir, Arc::new(AppState { tool: SqlQueryTool::new(target) }))
    }

    #[tokio::test]
    async fn test_list_tools() {
        let (_dir, state) = state();
        let Json(tools) = list_tools(State(state)).await.unwrap();
        assert_eq!(tools[0]["name"], "sql_query_executor");
    }

    #[tokio::test]
    async fn test_query_and_bad_query() {
        let (_dir, state) = state();
        let body = QueryBody { query: "SELECT COUNT(*) AS n FROM issues".into() };
        let Json(rows) = run_sql_query(State(state.clone()), Json(body)).await.unwrap();
        assert_eq!(rows, json!([{"n": 0}]));

        let body = QueryBody { query: "DROP TABLE issues".into() };
        let (status, Json(err)) = run_sql_query(State(state), Json(body)).await.unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!err.error.is_empty());
    }

    #[tokio::test]
    async fn test_stats_and_schema() {
        let (_dir, state) = state();
        let Json(stats) = get_stats(State(state.clone())).await.unwrap();
        assert_eq!(stats["dialect"], "sqlite");

        let Json(schema) = get_schema(State(state)).await.unwrap();
        assert!(schema["schema"].as_str().unwrap().contains("ingest_runs"));
    }
}
