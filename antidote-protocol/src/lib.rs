//! # antidote-protocol
//!
//! Wire protocol implementation for the AntidoteDB protocol-buffer interface.
//!
//! This crate provides:
//! - Length-prefixed binary framing (`u32` length, `u8` message code, payload)
//! - A receive buffer that extracts complete frames from partial reads
//! - Message codes and the AntidotePB protobuf schema
//! - Request/Response sum types dispatched by message code

pub mod codec;
pub mod error;
pub mod frame;
pub mod message;
pub mod proto;

pub use codec::{Decoder, Encoder, Inbound};
pub use error::{ErrorResponse, ProtocolError};
pub use frame::{Frame, ERROR_RESPONSE_CODE, LENGTH_PREFIX_SIZE};
pub use message::{MessageCode, Request, Response};
pub use proto::CrdtType;

/// Default port of the Antidote protocol-buffer interface.
pub const DEFAULT_PORT: u16 = 8087;

/// Maximum frame body size, message code included (16 MiB).
pub const MAX_FRAME_SIZE: u32 = 16 * 1024 * 1024;
