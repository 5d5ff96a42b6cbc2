//! Lakehouse Relay: REST relay in front of a data-lakehouse platform.
//!
//! The binary in `main.rs` wires configuration and logging; everything a
//! request touches lives here so integration tests in `tests/` can build the
//! same router.

pub mod api;
pub mod auth;
pub mod catalog;
pub mod config;
pub mod errors;
pub mod ingestion;
pub mod jobs;
pub mod lakehouse;
pub mod middleware;
pub mod monitoring;
pub mod query;
pub mod storage;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, HeaderName, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::{AllowOrigin, CorsLayer};

use auth::{CredentialManager, TokenSettings};
use catalog::CatalogService;
use config::Config;
use errors::AppError;
use ingestion::IngestionService;
use lakehouse::LakehouseClient;
use monitoring::MonitoringService;
use query::QueryCoordinator;
use storage::UploadStore;

/// JSON bodies outside the upload routes.
const JSON_BODY_LIMIT: usize = 10 * 1024 * 1024;

/// Shared application state passed to handlers and middleware.
pub struct AppState {
    pub config: Config,
    pub credentials: CredentialManager,
    pub queries: QueryCoordinator,
    pub catalogs: CatalogService,
    pub ingestion: IngestionService,
    pub uploads: UploadStore,
    pub monitoring: MonitoringService,
}

impl AppState {
    /// Uploads go to the S3-compatible endpoint from `config.storage`.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let uploads = UploadStore::s3(config.storage.clone());
        Self::with_upload_store(config, uploads)
    }

    pub fn with_upload_store(config: Config, uploads: UploadStore) -> anyhow::Result<Self> {
        let client = Arc::new(LakehouseClient::new(&config.lakehouse)?);
        let credentials =
            CredentialManager::new(client.clone(), TokenSettings::from(&config.lakehouse));

        let queries = QueryCoordinator::new(
            client.clone(),
            credentials.clone(),
            config.lakehouse.query_engine.clone(),
        );
        let catalogs = CatalogService::new(client.clone(), credentials.clone());
        let ingestion = IngestionService::new(
            client.clone(),
            credentials.clone(),
            config.lakehouse.default_engine.clone(),
            config.lakehouse.default_bucket.clone(),
        );
        let monitoring = MonitoringService::new(client, credentials.clone())?;

        Ok(Self {
            config,
            credentials,
            queries,
            catalogs,
            ingestion,
            uploads,
            monitoring,
        })
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(state.config.cors_origin.clone());

    Router::new()
        .route("/health", get(health))
        .route("/", get(describe))
        .route("/metrics", get(prometheus_metrics))
        .nest("/api", api::api_router(state.uploads.max_bytes()))
        .fallback(not_found)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::track_requests,
        ))
        .with_state(state)
        .layer(DefaultBodyLimit::max(JSON_BODY_LIMIT))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(cors)
        .layer(axum::middleware::from_fn(middleware::request_id))
        .layer(axum::middleware::from_fn(middleware::security_headers))
}

/// The configured dashboard origin plus any local dev server.
fn cors_layer(dashboard_origin: String) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin, _| {
            let origin = origin.to_str().unwrap_or("");
            origin == dashboard_origin
                || origin.starts_with("http://localhost:")
                || origin.starts_with("http://127.0.0.1:")
        }))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([
            HeaderName::from_static("content-type"),
            HeaderName::from_static("authorization"),
            HeaderName::from_static("x-request-id"),
        ])
        .allow_credentials(true)
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now(),
        "uptime": state.monitoring.uptime_secs(),
        "environment": state.config.environment,
    }))
}

async fn describe() -> impl IntoResponse {
    Json(json!({
        "name": "lakehouse-relay",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "/health",
            "metrics": "/metrics",
            "auth": "/api/auth",
            "query": "/api/query",
            "catalog": "/api/catalog",
            "ingestion": "/api/ingestion",
            "upload": "/api/upload",
            "monitoring": "/api/monitoring",
        },
    }))
}

async fn prometheus_metrics(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    let body = state.monitoring.metrics.render_prometheus()?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response())
}

async fn not_found(uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "success": false,
            "error": "Endpoint not found",
            "kind": "not_found",
            "path": uri.path(),
        })),
    )
}
