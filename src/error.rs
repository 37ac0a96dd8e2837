//! Error handling module
//!
//! Centralized error types and HTTP response conversion. Store-layer causes
//! are logged here and never exposed in response bodies.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::store::StoreError;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Client errors (4xx)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Insufficient balance")]
    InsufficientBalance,

    #[error("Wallet not found for user: {0}")]
    WalletNotFound(String),

    #[error("User already owns a wallet")]
    DuplicateWallet,

    // Server errors (5xx)
    #[error("Version conflict: concurrent modification detected")]
    VersionConflict,

    #[error("Storage operation failed")]
    Repository(#[source] StoreError),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, details) = match &self {
            // 400 Bad Request
            AppError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", Some(msg.clone()))
            }
            AppError::InsufficientBalance => {
                (StatusCode::BAD_REQUEST, "insufficient_balance", None)
            }

            // 404 Not Found
            AppError::WalletNotFound(user_id) => {
                (StatusCode::NOT_FOUND, "wallet_not_found", Some(user_id.clone()))
            }

            // 409 Conflict
            AppError::DuplicateWallet => {
                (StatusCode::CONFLICT, "wallet_already_exists", None)
            }

            // 500 Internal Server Error
            // The version check cannot trip while every writer takes the row
            // lock, so a conflict here means a store-layer fault.
            AppError::VersionConflict => {
                tracing::error!("Optimistic lock conflict surfaced despite row locking");
                (StatusCode::INTERNAL_SERVER_ERROR, "version_conflict", None)
            }
            AppError::Repository(cause) => {
                tracing::error!("Repository error: {:?}", cause);
                (StatusCode::INTERNAL_SERVER_ERROR, "repository_error", None)
            }
        };

        let body = ErrorResponse {
            error: self.to_string(),
            error_code: error_code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}
