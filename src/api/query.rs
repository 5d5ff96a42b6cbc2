use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use super::ok;
use crate::errors::AppError;
use crate::lakehouse::{Column, Row};
use crate::query::export::{self, ExportFormat};
use crate::query::DEFAULT_HISTORY_LIMIT;
use crate::AppState;

pub const DEFAULT_CATALOG: &str = "iceberg_data";
pub const DEFAULT_SCHEMA: &str = "default";

#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    pub sql: Option<String>,
    pub catalog: Option<String>,
    pub schema: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExportRequest {
    pub columns: Option<Vec<Column>>,
    pub rows: Option<Vec<Row>>,
    pub format: Option<String>,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/execute", post(execute))
        .route("/status/:query_id", get(status))
        .route("/cancel/:query_id", delete(cancel))
        .route("/history", get(history).delete(clear_history))
        .route("/export", post(export_results))
        .route("/catalogs", get(list_catalogs))
        .route("/catalogs/:catalog/schemas", get(list_schemas))
        .route("/catalogs/:catalog/schemas/:schema/tables", get(list_tables))
        .route(
            "/catalogs/:catalog/schemas/:schema/tables/:table",
            get(table_details),
        )
}

/// Absent or empty strings fall back to `default`.
fn or_default(value: Option<String>, default: &str) -> String {
    value
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

async fn execute(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ExecuteRequest>,
) -> Result<impl IntoResponse, AppError> {
    let sql = req
        .sql
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| AppError::Validation("SQL query is required".into()))?;
    let catalog = or_default(req.catalog, DEFAULT_CATALOG);
    let schema = or_default(req.schema, DEFAULT_SCHEMA);

    tracing::info!(catalog = %catalog, schema = %schema, sql_len = sql.len(), "executing query");
    let result = state.queries.execute(&sql, &catalog, &schema).await?;
    Ok(ok(result))
}

async fn status(
    State(state): State<Arc<AppState>>,
    Path(query_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.queries.status(&query_id).await?))
}

async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(query_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    state.queries.cancel(&query_id).await?;
    Ok(ok(json!({ "queryId": query_id, "cancelled": true })))
}

async fn history(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HistoryParams>,
) -> impl IntoResponse {
    let limit = params
        .limit
        .and_then(|l| l.parse::<usize>().ok())
        .filter(|l| *l > 0)
        .unwrap_or(DEFAULT_HISTORY_LIMIT);
    ok(state.queries.history().recent(limit).await)
}

async fn clear_history(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.queries.clear_history().await;
    Json(json!({ "success": true, "message": "Query history cleared" }))
}

async fn export_results(Json(req): Json<ExportRequest>) -> Result<Response, AppError> {
    let (columns, rows) = match (req.columns, req.rows) {
        (Some(c), Some(r)) => (c, r),
        _ => return Err(AppError::Validation("Columns and rows are required".into())),
    };
    let format = ExportFormat::parse(req.format.as_deref())?;

    let body = match format {
        ExportFormat::Csv => export::to_csv(&columns, &rows),
        ExportFormat::Json => export::to_json(&rows)?,
    };
    let filename = format!(
        "query_results_{}.{}",
        chrono::Utc::now().timestamp_millis(),
        format.extension()
    );

    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response())
}

async fn list_catalogs(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.catalogs.list_catalogs().await?))
}

async fn list_schemas(
    State(state): State<Arc<AppState>>,
    Path(catalog): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.catalogs.list_schemas(&catalog).await?))
}

async fn list_tables(
    State(state): State<Arc<AppState>>,
    Path((catalog, schema)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.catalogs.list_tables(&catalog, &schema).await?))
}

async fn table_details(
    State(state): State<Arc<AppState>>,
    Path((catalog, schema, table)): Path<(String, String, String)>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.catalogs.table_metadata(&catalog, &schema, &table).await?))
}
