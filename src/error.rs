//! Error types for the data layer
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Storage Error ==
/// Failures raised by a durable backend.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend could not be opened; the session runs without persistence
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// I/O failure while reading or committing a record
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored record could not be encoded or decoded
    #[error("Corrupt record: {0}")]
    Corrupt(#[from] serde_json::Error),

    /// The background writer has shut down
    #[error("Storage writer closed")]
    Closed,
}

// == Transport Error ==
/// A failed upstream call, carrying the HTTP status (0 when no response arrived).
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Upstream request failed with status {status}: {body}")]
pub struct TransportError {
    pub status: u16,
    pub body: String,
}

impl TransportError {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Network unreachable (status 0) or gateway timeout (504).
    ///
    /// These are the only failures that send a mutation to the offline queue.
    pub fn is_transient(&self) -> bool {
        self.status == 0 || self.status == 504
    }
}

// == Error Enum ==
/// Unified error type for the data layer.
#[derive(Error, Debug)]
pub enum Error {
    /// Durable storage failed
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Upstream call failed with an application-level status
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A value could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The upstream accepted the request but answered with an unexpected shape
    #[error("Upstream response has an unexpected shape: {source}")]
    UnexpectedResponse {
        response: serde_json::Value,
        #[source]
        source: serde_json::Error,
    },

    /// Offline with no durable queue to hold the mutation
    #[error("Offline and no persistent queue is available")]
    OfflineUnavailable,

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::Transport(err) => {
                StatusCode::from_u16(err.status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            Error::UnexpectedResponse { .. } => StatusCode::BAD_GATEWAY,
            Error::OfflineUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Error::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Error::Storage(_) | Error::Serialization(_) | Error::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the data layer.
pub type Result<T> = std::result::Result<T, Error>;
