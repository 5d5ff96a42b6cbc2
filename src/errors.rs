use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// Bad input; raised before any network call is made.
    #[error("{0}")]
    Validation(String),

    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The platform refused or never received a query / job submission.
    #[error("submission failed: {0}")]
    Submission(String),

    /// The platform reported the query as failed or cancelled.
    #[error("{0}")]
    QueryExecution(String),

    #[error("{0}")]
    QueryTimeout(String),

    /// Network failure or non-success HTTP status from the platform.
    #[error("{message}")]
    Transport {
        status: Option<u16>,
        message: String,
    },

    #[error("{0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(#[from] object_store::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn transport(status: Option<u16>, message: impl Into<String>) -> Self {
        AppError::Transport {
            status,
            message: message.into(),
        }
    }

    /// Stable machine-readable kind, used in the error envelope and in history.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::Authentication(_) => "authentication_error",
            AppError::Submission(_) => "submission_error",
            AppError::QueryExecution(_) => "query_execution_error",
            AppError::QueryTimeout(_) => "query_timeout_error",
            AppError::Transport { .. } => "transport_error",
            AppError::NotFound(_) => "not_found",
            AppError::Storage(_) => "storage_error",
            AppError::Internal(_) => "internal_error",
        }
    }

    /// HTTP status reported by the platform, if the error carries one.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            AppError::Transport { status, .. } => *status,
            _ => None,
        }
    }

    /// 4xx responses from the platform are never retried.
    pub fn is_client_error(&self) -> bool {
        matches!(self.upstream_status(), Some(s) if (400..500).contains(&s))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Authentication(_) => StatusCode::UNAUTHORIZED,
            AppError::Submission(_) => StatusCode::BAD_GATEWAY,
            AppError::QueryExecution(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::QueryTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Transport { .. } => StatusCode::BAD_GATEWAY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Storage(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let msg = match &self {
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:#}", e);
                "internal server error".to_string()
            }
            AppError::Storage(e) => {
                tracing::error!("Object storage error: {}", e);
                self.to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "success": false,
            "error": msg,
            "kind": self.kind(),
        }));

        (status, body).into_response()
    }
}
