//! Encoder and decoder for Antidote frames and messages.

use crate::error::{ErrorResponse, ProtocolError};
use crate::frame::{Frame, ERROR_RESPONSE_CODE};
use crate::message::{Request, Response};
use crate::proto::ApbErrorResp;
use bytes::{Bytes, BytesMut};
use prost::Message;

/// Encodes requests and responses into frames.
pub struct Encoder;

impl Encoder {
    /// Encodes a request into a frame.
    pub fn encode_request(request: &Request) -> Result<BytesMut, ProtocolError> {
        Frame::new(request.code().as_u8(), request.encode_payload()).encode()
    }

    /// Encodes a response into a frame.
    pub fn encode_response(response: &Response) -> Result<BytesMut, ProtocolError> {
        Frame::new(response.code().as_u8(), response.encode_payload()).encode()
    }

    /// Encodes an error frame.
    pub fn encode_error(error: &ErrorResponse) -> Result<BytesMut, ProtocolError> {
        let payload = ApbErrorResp {
            errmsg: Bytes::from(error.message.clone()),
            errcode: error.code,
        }
        .encode_to_vec();
        Frame::new(ERROR_RESPONSE_CODE, payload).encode()
    }
}

/// A decoded server-to-client frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// An error frame (message code `0`).
    Error(ErrorResponse),
    /// A frame that carried only a message code and no payload.
    ///
    /// The server uses this for "no data", e.g. an unset register.
    Empty(u8),
    /// A regular response.
    Response(Response),
}

impl Inbound {
    /// Interprets a complete frame.
    pub fn from_frame(frame: Frame) -> Result<Self, ProtocolError> {
        if frame.is_error() {
            let err = ApbErrorResp::decode(frame.payload)?;
            let message = String::from_utf8(err.errmsg.to_vec())
                .map_err(|_| ProtocolError::InvalidUtf8)?;
            return Ok(Inbound::Error(ErrorResponse::new(err.errcode, message)));
        }

        if frame.payload.is_empty() {
            return Ok(Inbound::Empty(frame.code));
        }

        Ok(Inbound::Response(Response::decode(
            frame.code,
            &frame.payload,
        )?))
    }

    /// Short description of the frame, for diagnostics.
    pub fn describe(&self) -> String {
        match self {
            Inbound::Error(err) => format!("error frame ({})", err),
            Inbound::Empty(code) => format!("empty frame (code {})", code),
            Inbound::Response(resp) => resp.name().to_string(),
        }
    }
}

/// Accumulates socket reads and extracts complete frames.
///
/// Bytes of a committed frame are split off the front of the buffer, so
/// they are never re-read and the allocation is reclaimed once drained.
/// A partial trailing frame stays buffered until the rest arrives.
pub struct Decoder {
    buffer: BytesMut,
}

impl Decoder {
    pub fn new() -> Self {
        Self::with_capacity(8192)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
        }
    }

    /// Appends data to the internal buffer.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Attempts to decode the next frame from the buffer.
    pub fn decode_frame(&mut self) -> Result<Option<Frame>, ProtocolError> {
        Frame::decode(&mut self.buffer)
    }

    /// Attempts to decode and interpret the next frame from the buffer.
    pub fn decode_inbound(&mut self) -> Result<Option<Inbound>, ProtocolError> {
        match self.decode_frame()? {
            Some(frame) => Ok(Some(Inbound::from_frame(frame)?)),
            None => Ok(None),
        }
    }

    /// Attempts to decode the next request from the buffer.
    pub fn decode_request(&mut self) -> Result<Option<Request>, ProtocolError> {
        match self.decode_frame()? {
            Some(frame) => Ok(Some(Request::decode(frame.code, &frame.payload)?)),
            None => Ok(None),
        }
    }

    /// Returns the number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Clears the internal buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}
