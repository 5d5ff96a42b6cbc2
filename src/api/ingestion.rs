use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use super::{created, ok};
use crate::errors::AppError;
use crate::ingestion::{validate_job, IngestionJobRequest, JobFilters, SUPPORTED_FILE_TYPES};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/jobs", get(list_jobs).post(create_job))
        .route("/jobs/:job_id", get(job_status).delete(cancel_job))
        .route("/config/default", get(default_config))
        .route("/file-types", get(file_types))
        .route("/validate", post(validate))
}

async fn create_job(
    State(state): State<Arc<AppState>>,
    Json(req): Json<IngestionJobRequest>,
) -> Result<Response, AppError> {
    let report = validate_job(&req);
    if !report.valid {
        tracing::warn!(errors = ?report.errors, "rejected ingestion job");
        let body = json!({
            "success": false,
            "error": "Invalid ingestion configuration",
            "kind": "validation_error",
            "errors": report.errors,
        });
        return Ok((StatusCode::BAD_REQUEST, Json(body)).into_response());
    }
    Ok(created(state.ingestion.create_job(req).await?))
}

async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(filters): Query<JobFilters>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.ingestion.list_jobs(&filters).await?))
}

async fn job_status(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.ingestion.job_status(&job_id).await?))
}

async fn cancel_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.ingestion.cancel_job(&job_id).await?))
}

async fn default_config(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ok(state.ingestion.default_config())
}

async fn file_types() -> impl IntoResponse {
    ok(SUPPORTED_FILE_TYPES)
}

async fn validate(Json(req): Json<IngestionJobRequest>) -> impl IntoResponse {
    ok(validate_job(&req))
}
