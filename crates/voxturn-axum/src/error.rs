//! Axum-specific error types and mappings.
//!
//! Maps turn, transcription and synthesis errors onto HTTP status codes and
//! a `{ "error", "status" }` JSON body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use voxturn_core::{SynthesisError, TranscriptionError, TurnError};

#[derive(Debug, Error)]
pub enum HttpError {
    /// Resource not found (unknown or expired audio, no turn yet).
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request (invalid input).
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A turn is already streaming for the session.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// An upstream service (agent, STT, TTS) failed.
    #[error("Upstream failure: {0}")]
    BadGateway(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
    status: u16,
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg),
            Self::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = ErrorBody {
            error: message,
            status: status.as_u16(),
        };
        (status, axum::Json(body)).into_response()
    }
}

impl From<TurnError> for HttpError {
    fn from(err: TurnError) -> Self {
        match err {
            TurnError::TurnInProgress(_) => Self::Conflict(err.to_string()),
            TurnError::EmptyInput => Self::BadRequest(err.to_string()),
            TurnError::Agent(e) => Self::BadGateway(e.to_string()),
        }
    }
}

impl From<TranscriptionError> for HttpError {
    fn from(err: TranscriptionError) -> Self {
        match err {
            TranscriptionError::EmptyAudio => Self::BadRequest(err.to_string()),
            TranscriptionError::Request(_)
            | TranscriptionError::Upstream { .. }
            | TranscriptionError::Decode(_) => Self::BadGateway(err.to_string()),
        }
    }
}

impl From<SynthesisError> for HttpError {
    fn from(err: SynthesisError) -> Self {
        match err {
            SynthesisError::Storage(msg) => Self::Internal(msg),
            SynthesisError::Request(_) | SynthesisError::Upstream { .. } => {
                Self::BadGateway(err.to_string())
            }
        }
    }
}
