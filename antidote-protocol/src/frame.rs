//! Binary frame format of the Antidote protocol-buffer interface.
//!
//! Frame layout:
//!
//! ```text
//! +-------------+--------+-----------------------+
//! |   length    |  code  | payload               |
//! | 4 bytes, BE | 1 byte | length - 1 bytes      |
//! +-------------+--------+-----------------------+
//! ```
//!
//! `length` counts the message code and the payload, so a frame that carries
//! only a code has `length == 1`.

use crate::error::ProtocolError;
use crate::MAX_FRAME_SIZE;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Size of the length prefix in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Message code reserved for error frames sent by the server.
pub const ERROR_RESPONSE_CODE: u8 = 0;

/// A single frame: message code plus raw payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Message code identifying the payload schema.
    pub code: u8,
    /// Encoded payload (possibly empty).
    pub payload: Bytes,
}

impl Frame {
    /// Creates a new frame with the given code and payload.
    pub fn new(code: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            code,
            payload: payload.into(),
        }
    }

    /// Returns whether this is an error frame.
    pub fn is_error(&self) -> bool {
        self.code == ERROR_RESPONSE_CODE
    }

    /// Encodes the frame into bytes.
    pub fn encode(&self) -> Result<BytesMut, ProtocolError> {
        let body_len = self.payload.len() + 1;
        if body_len > MAX_FRAME_SIZE as usize {
            return Err(ProtocolError::FrameTooLarge {
                size: u32::try_from(body_len).unwrap_or(u32::MAX),
                max: MAX_FRAME_SIZE,
            });
        }

        let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + body_len);
        buf.put_u32(body_len as u32);
        buf.put_u8(self.code);
        buf.put_slice(&self.payload);
        Ok(buf)
    }

    /// Decodes a frame from bytes.
    ///
    /// Returns `Ok(Some(frame))` if a complete frame was decoded,
    /// `Ok(None)` if more data is needed, or `Err` on protocol errors.
    /// Nothing is consumed from `buf` unless a whole frame is present.
    pub fn decode(buf: &mut BytesMut) -> Result<Option<Self>, ProtocolError> {
        if buf.len() < LENGTH_PREFIX_SIZE {
            return Ok(None);
        }

        // Peek at the length without consuming
        let body_len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
        if body_len == 0 {
            return Err(ProtocolError::EmptyFrame);
        }
        if body_len > MAX_FRAME_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: body_len,
                max: MAX_FRAME_SIZE,
            });
        }

        let total_len = LENGTH_PREFIX_SIZE + body_len as usize;
        if buf.len() < total_len {
            return Ok(None);
        }

        buf.advance(LENGTH_PREFIX_SIZE);
        let code = buf.get_u8();
        let payload = buf.split_to(body_len as usize - 1).freeze();

        Ok(Some(Self { code, payload }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_frame_layout() {
        let frame = Frame::new(116, Bytes::from_static(b"abc"));
        let encoded = frame.encode().unwrap();

        assert_eq!(&encoded[..], &[0, 0, 0, 4, 116, b'a', b'b', b'c']);
    }

    #[test]
    fn test_code_only_frame() {
        let frame = Frame::new(111, Bytes::new());
        let mut encoded = frame.encode().unwrap();
        assert_eq!(&encoded[..], &[0, 0, 0, 1, 111]);

        let decoded = Frame::decode(&mut encoded).unwrap().unwrap();
        assert_eq!(decoded.code, 111);
        assert!(decoded.payload.is_empty());
        assert!(encoded.is_empty());
    }

    #[test]
    fn test_incomplete_length_prefix() {
        let mut buf = BytesMut::from(&[0u8, 0, 0][..]);
        assert!(Frame::decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn test_incomplete_body_is_not_consumed() {
        let mut buf = BytesMut::from(&[0u8, 0, 0, 5, 126, 1, 2][..]);
        assert!(Frame::decode(&mut buf).unwrap().is_none());
        // The length peek must be rolled back
        assert_eq!(buf.len(), 7);

        buf.extend_from_slice(&[3, 4]);
        let frame = Frame::decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame.code, 126);
        assert_eq!(&frame.payload[..], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_zero_length_frame_rejected() {
        let mut buf = BytesMut::from(&[0u8, 0, 0, 0, 7][..]);
        assert!(matches!(
            Frame::decode(&mut buf),
            Err(ProtocolError::EmptyFrame)
        ));
    }

    #[test]
    fn test_frame_too_large() {
        let mut buf = BytesMut::new();
        buf.put_u32(MAX_FRAME_SIZE + 1);
        buf.put_u8(127);
        assert!(matches!(
            Frame::decode(&mut buf),
            Err(ProtocolError::FrameTooLarge { .. })
        ));

        let frame = Frame::new(118, vec![0u8; MAX_FRAME_SIZE as usize]);
        assert!(matches!(
            frame.encode(),
            Err(ProtocolError::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn test_multiple_frames_in_buffer() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&Frame::new(124, &b"one"[..]).encode().unwrap());
        buf.extend_from_slice(&Frame::new(0, &b"two"[..]).encode().unwrap());
        buf.extend_from_slice(&[0, 0]);

        let first = Frame::decode(&mut buf).unwrap().unwrap();
        assert_eq!(first.code, 124);
        assert!(!first.is_error());

        let second = Frame::decode(&mut buf).unwrap().unwrap();
        assert!(second.is_error());
        assert_eq!(&second.payload[..], b"two");

        assert!(Frame::decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 2);
    }

    proptest! {
        #[test]
        fn prop_frame_roundtrip(code in any::<u8>(), payload in proptest::collection::vec(any::<u8>(), 0..512)) {
            let frame = Frame::new(code, payload);
            let mut encoded = frame.encode().unwrap();
            let decoded = Frame::decode(&mut encoded).unwrap().unwrap();
            prop_assert_eq!(decoded, frame);
            prop_assert!(encoded.is_empty());
        }
    }
}
