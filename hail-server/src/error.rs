//! Server error types with HTTP status mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Server-level errors.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Rejected request body.
    #[error(transparent)]
    Validation(#[from] hail_core::ValidationError),

    /// Downstream publish failure.
    #[error(transparent)]
    Ingest(#[from] hail_ingest::IngestError),

    /// Store failure (fatal at startup when the store is required).
    #[error(transparent)]
    Store(#[from] hail_store::StoreError),

    /// Realtime layer failure.
    #[error(transparent)]
    Realtime(#[from] hail_realtime::RealtimeError),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Bind/serve failures.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// Map error to HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::Validation(_) => StatusCode::BAD_REQUEST,
            ServerError::Ingest(_)
            | ServerError::Store(_)
            | ServerError::Realtime(_)
            | ServerError::Config(_)
            | ServerError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
    status: u16,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            error: self.to_string(),
            status: status.as_u16(),
        };
        (status, axum::Json(body)).into_response()
    }
}

/// Result type alias for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;
