//! Client error types.

use antidote_protocol::ErrorResponse;
use thiserror::Error;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] antidote_protocol::ProtocolError),

    #[error("connection lost: {0}")]
    ConnectionLost(String),

    #[error("connection closed by server")]
    ConnectionClosed,

    #[error("client closed")]
    Closed,

    #[error("request timeout")]
    Timeout,

    #[error("server error: code {code} - {message}")]
    ServerError { code: u32, message: String },

    #[error("operation rejected by server: error code {code}")]
    Rejected { code: u32 },

    #[error("unexpected response: expected {expected}, got {actual}")]
    UnexpectedResponse {
        expected: &'static str,
        actual: String,
    },

    #[error("type mismatch: expected {expected} value, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("value encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("value decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClientError {
    /// Builds the error for a server error frame.
    pub fn server(err: ErrorResponse) -> Self {
        ClientError::ServerError {
            code: err.code,
            message: err.message,
        }
    }

    /// Builds the error for a response with `success = false`.
    pub(crate) fn rejected(errorcode: Option<u32>) -> Self {
        ClientError::Rejected {
            code: errorcode.unwrap_or(0),
        }
    }

    /// Returns whether this error is retryable.
    ///
    /// Transport failures leave the client reconnectable; the next request
    /// opens a fresh socket.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClientError::Io(_)
                | ClientError::Timeout
                | ClientError::ConnectionLost(_)
                | ClientError::ConnectionClosed
        )
    }

    /// Returns whether this error invalidated the connection.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ClientError::Io(_)
                | ClientError::Protocol(_)
                | ClientError::Timeout
                | ClientError::ConnectionLost(_)
                | ClientError::ConnectionClosed
        )
    }
}
