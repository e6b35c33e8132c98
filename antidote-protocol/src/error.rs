//! Protocol error types and decoded server errors.

use std::fmt;
use thiserror::Error;

/// Protocol-level errors that can occur during framing or message handling.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: u32, max: u32 },

    #[error("empty frame: length prefix must cover the message code")]
    EmptyFrame,

    #[error("unknown message code: {0}")]
    UnknownMessageCode(u8),

    #[error("message code {code} is not a valid {direction}")]
    UnexpectedMessageCode { code: u8, direction: &'static str },

    #[error("protobuf decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("invalid UTF-8 in error message")]
    InvalidUtf8,
}

/// An error frame (message code `0`) sent by the server.
///
/// The server answers a request with an error frame when it could not
/// process the request at all, as opposed to a regular response carrying
/// `success = false`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorResponse {
    /// Numeric error code reported by the server.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Antidote-PB error code {}: {}", self.code, self.message)
    }
}
