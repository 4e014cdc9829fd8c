//! Error taxonomy of the analysis service
//!
//! Every failure a caller can observe maps to exactly one variant, and every variant
//! to one HTTP status. Infrastructure failures are logged with their cause where they
//! are converted; the response only carries a generic message.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Input rejected by a business rule (400)
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// Missing, invalid, expired or revoked credential (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not allowed, or bad callback secret (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource does not exist or is not visible (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Uniqueness or concurrent-modification conflict (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Operation not legal in the resource's current lifecycle state (422)
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Storage or other infrastructure failure (500)
    #[error("Infrastructure error: {0}")]
    Infrastructure(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::ValidationFailed(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::InvalidState(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Infrastructure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::ValidationFailed(_) => "VALIDATION_FAILED",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::InvalidState(_) => "INVALID_STATE",
            ApiError::Infrastructure(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<tga_common::Error> for ApiError {
    fn from(err: tga_common::Error) -> Self {
        match err {
            tga_common::Error::NotFound(what) => ApiError::NotFound(what),
            other => {
                error!(error = %other, "Shared layer failure");
                ApiError::Infrastructure(other.to_string())
            }
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        error!(error = %err, "Database failure");
        ApiError::Infrastructure(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::ValidationFailed(format!("malformed request body: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::ValidationFailed(format!("malformed query string: {}", rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            ApiError::Infrastructure(_) => "Internal server error".to_string(),
            ApiError::ValidationFailed(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::InvalidState(msg) => msg.clone(),
        };

        let body = Json(json!({
            "error": {
                "code": self.code(),
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for handlers and services
pub type ApiResult<T> = Result<T, ApiError>;

/// Whether a sqlx error is a UNIQUE constraint violation
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|db_err| db_err.is_unique_violation())
        .unwrap_or(false)
}
