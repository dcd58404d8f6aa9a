use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use crate::tools::SqlQueryTool;

pub mod routes;

/// Server state
pub struct AppState {
    pub tool: SqlQueryTool,
}

pub fn router(tool: SqlQueryTool) -> Router {
    let state = Arc::new(AppState { tool });

    Router::new()
        .route("/tools", get(routes::list_tools))
        .route("/tools/sql_query_executor", post(routes::run_sql_query))
        .route("/stats", get(routes::get_stats))
        .route("/schema", get(routes::get_schema))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server(port: u16, tool: SqlQueryTool) -> anyhow::Result<()> {
    let target = tool.target().describe();
    let app = router(tool);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Starting tool server on {} for {}", addr, target);
    println!("🌍 Tool server running at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
