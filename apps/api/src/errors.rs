use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::auth::AuthError;
use crate::repository::RepositoryError;
use crate::storage::StorageError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Resume quota exceeded")]
    QuotaExceeded,

    #[error("Duplicate resume name: {0}")]
    DuplicateName(String),

    #[error("Upload exceeds the size limit")]
    PayloadTooLarge,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("Scoring service error: {0}")]
    Scoring(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::QuotaExceeded => AppError::QuotaExceeded,
            RepositoryError::DuplicateName => {
                AppError::DuplicateName("a resume with this name already exists".to_string())
            }
            RepositoryError::Timeout => AppError::Timeout("the metadata store"),
            RepositoryError::Database(e) => AppError::Database(e),
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Timeout => AppError::Timeout("the object store"),
            other => AppError::Storage(other.to_string()),
        }
    }
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Auth(e) => match e {
                AuthError::StateMismatch => {
                    (StatusCode::BAD_REQUEST, "STATE_MISMATCH", e.to_string())
                }
                AuthError::Timeout => {
                    tracing::warn!("Identity provider timed out");
                    (
                        StatusCode::GATEWAY_TIMEOUT,
                        "TIMEOUT",
                        "The identity provider did not respond in time".to_string(),
                    )
                }
                AuthError::Signing(msg) => {
                    tracing::error!("Session signing error: {msg}");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal server error occurred".to_string(),
                    )
                }
                AuthError::ExchangeFailed(msg) | AuthError::IdentityFetchFailed(msg) => {
                    tracing::warn!("Login failed: {msg}");
                    (
                        StatusCode::UNAUTHORIZED,
                        "UNAUTHORIZED",
                        "Login with the identity provider failed".to_string(),
                    )
                }
                _ => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", e.to_string()),
            },
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::QuotaExceeded => (
                StatusCode::CONFLICT,
                "QUOTA_EXCEEDED",
                "You already have the maximum number of resumes".to_string(),
            ),
            AppError::DuplicateName(msg) => (StatusCode::CONFLICT, "DUPLICATE_NAME", msg.clone()),
            AppError::PayloadTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "PAYLOAD_TOO_LARGE",
                "The uploaded file is too large".to_string(),
            ),
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Storage(msg) => {
                tracing::error!("Storage error: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "STORAGE_ERROR",
                    "A storage error occurred".to_string(),
                )
            }
            AppError::Timeout(what) => {
                tracing::warn!("Timed out waiting for {what}");
                (
                    StatusCode::GATEWAY_TIMEOUT,
                    "TIMEOUT",
                    format!("Timed out waiting for {what}"),
                )
            }
            AppError::Scoring(msg) => {
                tracing::error!("Scoring service error: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "SCORING_ERROR",
                    "The resume could not be analyzed".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        let body = Json(json!({
            "error": code,
            "message": message
        }));
        (status, body).into_response()
    }
}
