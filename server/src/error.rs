use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Failure of a call against the live spectating service or the platform API
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("resource not found")]
    NotFound,
    #[error("rate limit exceeded")]
    RateLimited,
    #[error("service unavailable")]
    Unavailable,
    #[error("unexpected status code {0}")]
    Status(u16),
    #[error("request failed: {0}")]
    Request(String),
    #[error("malformed response: {0}")]
    Decode(String),
}

impl TransportError {
    pub fn from_status(status: u16) -> Self {
        match status {
            404 => TransportError::NotFound,
            429 => TransportError::RateLimited,
            503 => TransportError::Unavailable,
            other => TransportError::Status(other),
        }
    }

    /// HTTP status behind this error, if the remote side answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::NotFound => Some(404),
            TransportError::RateLimited => Some(429),
            TransportError::Unavailable => Some(503),
            TransportError::Status(code) => Some(*code),
            TransportError::Request(_) | TransportError::Decode(_) => None,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        // Request urls carry the api key
        let e = e.without_url();
        if e.is_decode() {
            return TransportError::Decode(e.to_string());
        }
        match e.status() {
            Some(status) => TransportError::from_status(status.as_u16()),
            None => TransportError::Request(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(e: serde_json::Error) -> Self {
        TransportError::Decode(e.to_string())
    }
}

/// Failure of one of the emulated replay endpoints
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("unknown region `{0}`")]
    UnknownRegion(String),
    #[error("no recording for this match")]
    RecordingNotFound,
    #[error("chunk {0} not found")]
    ChunkNotFound(u32),
    #[error("keyframe {0} not found")]
    KeyFrameNotFound(u32),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl IntoResponse for ReplayError {
    fn into_response(self) -> Response {
        match self {
            ReplayError::Storage(e) => {
                tracing::error!(error = %e, "Replay storage failure");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
            other => {
                tracing::debug!("Replay request not found: {}", other);
                StatusCode::NOT_FOUND.into_response()
            }
        }
    }
}
