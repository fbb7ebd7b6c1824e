// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // 404 Not Found: comment or referenced parent absent or already soft-deleted
    #[error("{0}")]
    NotFound(String),

    // 403 Forbidden: caller is not the comment's author
    #[error("{0}")]
    Unauthorized(String),

    // 400 Bad Request
    #[error("{0}")]
    Validation(String),

    // 409 Conflict: the store rejected a write because of a concurrent update
    #[error("{0}")]
    StorageConflict(String),

    // 500 Internal Server Error
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn comment_not_found(id: impl std::fmt::Display) -> Self {
        AppError::NotFound(format!("Comment not found with id: {}", id))
    }
}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Internal(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::StorageConflict(msg) => {
                tracing::warn!("Storage conflict: {}", msg);
                (StatusCode::CONFLICT, msg)
            }
        };
        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Converts `sqlx::Error` into `AppError`.
/// Serialization failures and deadlocks become `StorageConflict` so callers may retry;
/// everything else is internal.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if let Some(code) = db_err.code() {
                if code == "40001" || code == "40P01" {
                    return AppError::StorageConflict(db_err.message().to_string());
                }
            }
        }
        AppError::Internal(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}
