use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;

use super::ok;
use crate::auth::TokenInfo;
use crate::errors::AppError;
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedToken {
    pub token: String,
    pub token_info: TokenInfo,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/status", get(status))
        .route("/logout", post(logout))
}

async fn renew(state: &AppState) -> Result<IssuedToken, AppError> {
    let token = state.credentials.force_renew().await?;
    Ok(IssuedToken {
        token,
        token_info: state.credentials.describe(),
    })
}

async fn login(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    Ok(ok(renew(&state).await?))
}

async fn refresh(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    tracing::info!("token refresh requested");
    Ok(ok(renew(&state).await?))
}

async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ok(state.credentials.describe())
}

async fn logout(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.credentials.invalidate();
    Json(json!({
        "success": true,
        "message": "Logged out successfully",
    }))
}
