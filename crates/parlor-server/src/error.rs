//! HTTP error mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use parlor_core::errors::ParlorError;
use parlor_stream::StreamError;
use serde::Serialize;
use thiserror::Error;

/// Error returned by HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed request.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Unknown resource.
    #[error("not found: {0}")]
    NotFound(String),
    /// The server is shutting down.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Anything else.
    #[error("internal: {0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ParlorError> for ApiError {
    fn from(err: ParlorError) -> Self {
        match err {
            ParlorError::InvalidId { .. } | ParlorError::BranchOutOfRange { .. } => {
                Self::BadRequest(err.to_string())
            }
            e if e.is_not_found() => Self::NotFound(e.to_string()),
            e => Self::Internal(e.to_string()),
        }
    }
}

impl From<StreamError> for ApiError {
    fn from(err: StreamError) -> Self {
        match err {
            StreamError::ConversationNotFound(_) => Self::NotFound(err.to_string()),
            StreamError::ShuttingDown => Self::ServiceUnavailable(err.to_string()),
            StreamError::Core(e) => e.into(),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: u16,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), error = %self, "request failed");
        }
        let body = ErrorBody {
            error: self.to_string(),
            code: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}
