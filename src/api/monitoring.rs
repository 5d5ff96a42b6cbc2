use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use super::ok;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/metrics", get(metrics))
        .route("/realtime", get(realtime))
        .route("/health", get(platform_health))
        .route("/dashboard", get(dashboard))
        .route("/system", get(system))
        .route("/reset", post(reset))
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ok(state.monitoring.report())
}

async fn realtime(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ok(state.monitoring.realtime())
}

async fn platform_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ok(state.monitoring.platform_health().await)
}

async fn dashboard(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ok(state.monitoring.dashboard().await)
}

async fn system(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ok(state.monitoring.system())
}

async fn reset(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.monitoring.metrics.reset();
    tracing::info!("request metrics reset");
    Json(json!({ "success": true, "message": "Metrics reset successfully" }))
}
