use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use super::{ok, Envelope};
use crate::errors::AppError;
use crate::storage::upload::MAX_FILES_PER_REQUEST;
use crate::storage::IncomingFile;
use crate::AppState;

/// Room for multipart framing and the text fields around the file bytes.
const FORM_OVERHEAD: usize = 1024 * 1024;

#[derive(Default)]
struct UploadForm {
    bucket: Option<String>,
    path: Option<String>,
    files: Vec<IncomingFile>,
}

pub fn router(max_file_bytes: usize) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/",
            post(upload_one).layer(DefaultBodyLimit::max(max_file_bytes + FORM_OVERHEAD)),
        )
        .route(
            "/multiple",
            post(upload_many).layer(DefaultBodyLimit::max(
                max_file_bytes * MAX_FILES_PER_REQUEST + FORM_OVERHEAD,
            )),
        )
}

fn bad_form(e: impl std::fmt::Display) -> AppError {
    AppError::Validation(format!("invalid multipart body: {}", e))
}

/// Collect text fields and every part named `file_field`, in any order.
async fn read_form(mut multipart: Multipart, file_field: &str) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart.next_field().await.map_err(bad_form)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "bucket" => form.bucket = Some(field.text().await.map_err(bad_form)?),
            "path" => form.path = Some(field.text().await.map_err(bad_form)?),
            n if n == file_field => {
                let file_name = field
                    .file_name()
                    .filter(|f| !f.is_empty())
                    .map(str::to_string)
                    .ok_or_else(|| AppError::Validation("file part is missing a filename".into()))?;
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field.bytes().await.map_err(bad_form)?;
                form.files.push(IncomingFile {
                    file_name,
                    content_type,
                    data,
                });
            }
            _ => {}
        }
    }
    Ok(form)
}

fn require_bucket(form: &UploadForm) -> Result<&str, AppError> {
    form.bucket
        .as_deref()
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .ok_or_else(|| AppError::Validation("Bucket name is required".into()))
}

async fn upload_one(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut form = read_form(multipart, "file").await?;
    if form.files.is_empty() {
        return Err(AppError::Validation("No file provided".into()));
    }
    let bucket = require_bucket(&form)?.to_string();
    let file = form.files.swap_remove(0);

    let uploaded = state
        .uploads
        .upload(&bucket, form.path.as_deref(), file)
        .await?;
    Ok(ok(uploaded))
}

async fn upload_many(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let form = read_form(multipart, "files").await?;
    if form.files.is_empty() {
        return Err(AppError::Validation("No files provided".into()));
    }
    let bucket = require_bucket(&form)?.to_string();

    let report = state
        .uploads
        .upload_many(&bucket, form.path.as_deref(), form.files)
        .await?;
    Ok(Json(Envelope {
        success: report.all_succeeded(),
        data: report,
    }))
}
