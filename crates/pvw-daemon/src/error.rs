// error.rs — The HTTP error surface.
//
// A closed set of error kinds independent of transport, each with one HTTP
// status. Error bodies are text/plain one-liners; secrets and token values
// never appear in any message (nothing upstream puts them there, and this
// layer adds none).

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use pvw_model::ValidateError;
use pvw_runner::{BackendError, RunnerError};

/// Everything a handler can fail with.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Validation, decoding, or query-parameter error.
    #[error("{0}")]
    InvalidArgument(String),

    /// Missing or invalid bearer token.
    #[error("{0}")]
    Unauthorized(String),

    /// Policy refused the apply.
    #[error("{0}")]
    PolicyDenied(String),

    /// Idempotency key reused with a different payload.
    #[error("idempotency key already used with a different payload")]
    IdempotencyConflict,

    /// The cluster answered, but with a terminal error (or an undecodable
    /// body).
    #[error("{0}")]
    UpstreamHttp(String),

    /// The cluster could not be reached within the deadline.
    #[error("{0}")]
    UpstreamTransport(String),

    /// Hashing, serialization, or filesystem failure.
    #[error("internal error: {0}")]
    Internal(String),

    /// The server-side auth token is not configured.
    #[error("{0}")]
    Unconfigured(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::PolicyDenied(_) => StatusCode::FORBIDDEN,
            ApiError::IdempotencyConflict => StatusCode::CONFLICT,
            ApiError::UpstreamHttp(_) => StatusCode::BAD_GATEWAY,
            ApiError::UpstreamTransport(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Unconfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(%status, error = %self, "request failed");
        } else {
            tracing::debug!(%status, error = %self, "request refused");
        }
        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            format!("{self}\n"),
        )
            .into_response()
    }
}

impl From<ValidateError> for ApiError {
    fn from(err: ValidateError) -> Self {
        ApiError::InvalidArgument(err.to_string())
    }
}

impl From<BackendError> for ApiError {
    fn from(err: BackendError) -> Self {
        match &err {
            BackendError::Transport { .. } => ApiError::UpstreamTransport(err.to_string()),
            BackendError::HttpStatus { .. } | BackendError::Decode(_) => {
                ApiError::UpstreamHttp(err.to_string())
            }
            BackendError::UnknownEnvironment(_) | BackendError::InvalidTarget(_) => {
                ApiError::InvalidArgument(err.to_string())
            }
        }
    }
}

impl From<RunnerError> for ApiError {
    fn from(err: RunnerError) -> Self {
        match err {
            RunnerError::PolicyDenied(reason) => ApiError::PolicyDenied(reason),
            RunnerError::Backend(backend) => backend.into(),
            RunnerError::Audit(audit) => ApiError::Internal(audit.to_string()),
        }
    }
}
