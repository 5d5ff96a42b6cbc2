use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

use super::{created, ok};
use crate::catalog::CreateCatalog;
use crate::errors::AppError;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:name", get(fetch).patch(update).delete(remove))
        .route("/:name/stats", get(stats))
        .route("/:name/tree", get(tree))
        .route(
            "/:name/schema/:schema/table/:table/metadata",
            get(table_metadata),
        )
}

async fn list(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.catalogs.list_catalogs().await?))
}

async fn fetch(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.catalogs.get_catalog(&name).await?))
}

async fn create(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateCatalog>,
) -> Result<Response, AppError> {
    Ok(created(state.catalogs.create_catalog(req).await?))
}

async fn update(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(patch): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.catalogs.update_catalog(&name, &patch).await?))
}

async fn remove(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    state.catalogs.delete_catalog(&name).await?;
    Ok(Json(json!({ "success": true, "message": "Catalog deleted successfully" })))
}

async fn stats(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.catalogs.stats(&name).await?))
}

async fn tree(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.catalogs.tree(&name).await?))
}

async fn table_metadata(
    State(state): State<Arc<AppState>>,
    Path((catalog, schema, table)): Path<(String, String, String)>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.catalogs.table_metadata(&catalog, &schema, &table).await?))
}
