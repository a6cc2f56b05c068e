/// Error types for the ingestion service
///
/// This module defines all error types that can occur across the control
/// plane. Errors are converted into the structured HTTP error body
/// described by the external interface.
use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde::Serialize;
use std::fmt;

/// Result type for ingestion operations
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types
#[derive(Debug)]
pub enum AppError {
    /// Bad request shape, size/length/checksum mismatch
    Validation(String),
    /// Missing or invalid credential
    Auth(String),
    /// Owner/admin mismatch
    Forbidden(String),
    /// Resource not found
    NotFound(String),
    /// Wrong upload state, missing chunks, idempotency fingerprint mismatch
    Conflict(String),
    /// One of the admission tiers rejected the request
    Throttled { reason: &'static str },
    /// Malformed or out-of-bounds Range header
    RangeNotSatisfiable(String),
    /// Object store or queue failure
    Upstream(String),
    /// Rendezvous deadline exceeded
    Timeout(String),
    /// Anything else
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(msg) => write!(f, "validation error: {msg}"),
            AppError::Auth(msg) => write!(f, "auth error: {msg}"),
            AppError::Forbidden(msg) => write!(f, "forbidden: {msg}"),
            AppError::NotFound(msg) => write!(f, "not found: {msg}"),
            AppError::Conflict(msg) => write!(f, "conflict: {msg}"),
            AppError::Throttled { reason } => write!(f, "throttled: {reason}"),
            AppError::RangeNotSatisfiable(msg) => write!(f, "range not satisfiable: {msg}"),
            AppError::Upstream(msg) => write!(f, "upstream error: {msg}"),
            AppError::Timeout(msg) => write!(f, "timeout: {msg}"),
            AppError::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

/// Stable snake_case error body returned for every non-2xx response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub detail: String,
    pub error_code: &'static str,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_id: Option<String>,
}

impl AppError {
    fn error_code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::Auth(msg) if msg.contains("token") => "invalid_token",
            AppError::Auth(_) => "missing_api_key",
            AppError::Forbidden(_) => "forbidden",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::Throttled { reason } => reason,
            AppError::RangeNotSatisfiable(_) => "range_not_satisfiable",
            AppError::Upstream(_) => "upstream_error",
            AppError::Timeout(_) => "timeout",
            AppError::Internal(_) => "internal_error",
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Throttled { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::RangeNotSatisfiable(_) => StatusCode::RANGE_NOT_SATISFIABLE,
            AppError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let body = ErrorBody {
            detail: self.to_string(),
            error_code: self.error_code(),
            request_id: uuid::Uuid::new_v4().to_string(),
            upload_id: None,
        };

        let mut builder = HttpResponse::build(status);
        if let AppError::Throttled { reason } = self {
            builder.insert_header(("Retry-After", "1"));
            builder.insert_header(("X-RateLimit-Reason", *reason));
        }
        builder.json(body)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Upstream(format!("database error: {err}"))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Upstream(format!("storage io error: {err}"))
    }
}
