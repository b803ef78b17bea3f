//! Questline — API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use questline_acts::domain::output::Output;
use questline_core::error::DomainError;
use serde::Serialize;
use thiserror::Error;

/// Startup and runtime errors for the API server.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required environment variable is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Database connection or pool error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Network binding or I/O error.
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),

    /// The quest script or schema could not be loaded.
    #[error("startup error: {0}")]
    Startup(#[from] DomainError),
}

/// JSON body returned for error responses.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code.
    pub error: &'static str,
    /// Human-readable error message. Generic for server-side failures.
    pub message: String,
    /// Message the transport should show the chat user, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<Output>,
}

/// HTTP-layer wrapper around `DomainError` that implements `IntoResponse`.
#[derive(Debug)]
pub struct ApiError {
    pub error: DomainError,
    pub reply: Option<Output>,
}

impl ApiError {
    /// Attaches a user-facing message to the error response.
    #[must_use]
    pub fn with_reply(error: DomainError, reply: Output) -> Self {
        Self {
            error,
            reply: Some(reply),
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(error: DomainError) -> Self {
        Self { error, reply: None }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.error {
            DomainError::Validation(_) => (StatusCode::BAD_REQUEST, self.error.to_string()),
            DomainError::NotFound(_) => (StatusCode::NOT_FOUND, self.error.to_string()),
            DomainError::Persistence(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".to_owned(),
            ),
            DomainError::Connection(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "service temporarily unavailable".to_owned(),
            ),
        };

        let body = ErrorBody {
            error: self.error.kind(),
            message,
            reply: self.reply,
        };

        (status, Json(body)).into_response()
    }
}
