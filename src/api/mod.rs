use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde::Serialize;

use crate::AppState;

pub mod auth;
pub mod catalog;
pub mod ingestion;
pub mod monitoring;
pub mod query;
pub mod upload;

/// `{ "success": true, "data": ... }`
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
}

pub fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        data,
    })
}

pub fn created<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, ok(data)).into_response()
}

/// Build the relay API router. The caller mounts this under `/api`.
pub fn api_router(max_upload_bytes: usize) -> Router<Arc<AppState>> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/query", query::router())
        .nest("/catalog", catalog::router())
        .nest("/ingestion", ingestion::router())
        .nest("/upload", upload::router(max_upload_bytes))
        .nest("/monitoring", monitoring::router())
}
