//! # API Error Type
//!
//! Unified error type for HTTP handlers.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Stockroom                              │
//! │                                                                         │
//! │  Handler → Service: Result<T, ApiError>                                │
//! │         │                                                               │
//! │         ├── Validation? ─── ValidationError ─────────────► 400          │
//! │         ├── Core rule?  ─── CoreError::DuplicateProduct ──► 409          │
//! │         ├── Store down? ─── DbError::ConnectionFailed ───► 503          │
//! │         │                   (reads degrade to empty instead)            │
//! │         ├── Lost race?  ─── DbError::Conflict ───────────► 409          │
//! │         └── Anything else ──────────────────────────────► 500          │
//! │                                                                         │
//! │  Body: { "success": false, "code": "DUPLICATE", "message": "..." }     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

use stockroom_core::{CoreError, ValidationError};
use stockroom_db::DbError;

/// Result alias for handlers and services.
pub type ApiResult<T> = Result<T, ApiError>;

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Resource not found (404)
    NotFound,

    /// Input validation failed (400)
    ValidationError,

    /// Spreadsheet could not be read (400)
    InvalidSpreadsheet,

    /// Explicit create collided with an existing entry (409)
    Duplicate,

    /// Concurrent writers kept winning (409)
    Conflict,

    /// Backing store unreachable (503)
    Unavailable,

    /// Database operation failed (500)
    DatabaseError,

    /// Internal server error (500)
    Internal,
}

impl ErrorCode {
    fn status(self) -> StatusCode {
        match self {
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::ValidationError | ErrorCode::InvalidSpreadsheet => StatusCode::BAD_REQUEST,
            ErrorCode::Duplicate | ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::DatabaseError | ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// API error returned from handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }

    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        self.code.status()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "success": false,
            "code": self.code,
            "message": self.message,
        });
        (self.status(), Json(body)).into_response()
    }
}

/// Converts database errors to API errors.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
            DbError::UniqueViolation { field, value } => ApiError::new(
                ErrorCode::Duplicate,
                format!("{} '{}' already exists", field, value),
            ),
            DbError::Conflict { .. } => ApiError::new(ErrorCode::Conflict, err.to_string()),
            DbError::ConnectionFailed(_) | DbError::PoolExhausted => {
                tracing::warn!(error = %err, "Store unavailable");
                ApiError::new(ErrorCode::Unavailable, "Store temporarily unavailable")
            }
            DbError::MigrationFailed(_)
            | DbError::QueryFailed(_)
            | DbError::Corrupt { .. }
            | DbError::Internal(_) => {
                // Log the actual error but return a generic message
                tracing::error!(error = %err, "Database operation failed");
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
        }
    }
}

/// Converts core errors to API errors.
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ProductNotFound(id) => ApiError::not_found("Product", &id),
            CoreError::VariantNotFound { .. } => ApiError::new(ErrorCode::NotFound, err.to_string()),
            CoreError::DuplicateProduct { .. } => ApiError::new(ErrorCode::Duplicate, err.to_string()),
            CoreError::InvalidSpreadsheet(_)
            | CoreError::EmptySpreadsheet
            | CoreError::MissingNameColumn => {
                ApiError::new(ErrorCode::InvalidSpreadsheet, err.to_string())
            }
            CoreError::CodesExhausted => ApiError::new(ErrorCode::Conflict, err.to_string()),
            CoreError::Validation(e) => ApiError::validation(e.to_string()),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::validation(err.to_string())
    }
}
