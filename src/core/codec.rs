//! Frame layer: length-delimited, type-tagged binary messages.
//!
//! Wire format, little-endian:
//!
//! ```text
//! [type_id: u16] [payload_len: u32] [payload bytes]
//! ```
//!
//! [`Frame::from_bytes`] is the strict single-frame parser used once a frame
//! has already been delimited: too few bytes is `TruncatedFrame`, trailing
//! bytes beyond the declared length is `MalformedFrame`. [`FrameCodec`] is
//! the streaming variant for `tokio_util::codec::Framed`, where bytes after
//! one frame simply belong to the next.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{ProtocolError, Result};

/// Bytes of header before the payload: u16 type id + u32 payload length.
pub const HEADER_LEN: usize = 6;

/// Max allowed payload size. A declared length above this is treated as a
/// malformed frame rather than an allocation request.
pub const MAX_PAYLOAD_SIZE: usize = 4 * 1024 * 1024;

/// One wire frame: a typed, length-delimited payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub type_id: u16,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(type_id: u16, payload: Bytes) -> Self {
        Self { type_id, payload }
    }

    /// Encode this frame, header included.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_LEN + self.payload.len());
        buf.put_u16_le(self.type_id);
        buf.put_u32_le(self.payload.len() as u32);
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    /// Parse exactly one frame from `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(ProtocolError::TruncatedFrame {
                needed: HEADER_LEN,
                available: bytes.len(),
            });
        }
        let mut header = &bytes[..HEADER_LEN];
        let type_id = header.get_u16_le();
        let declared = header.get_u32_le() as usize;

        if declared > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::MalformedFrame(format!(
                "declared payload length {declared} exceeds maximum {MAX_PAYLOAD_SIZE}"
            )));
        }

        let available = bytes.len() - HEADER_LEN;
        if available < declared {
            return Err(ProtocolError::TruncatedFrame {
                needed: HEADER_LEN + declared,
                available: bytes.len(),
            });
        }
        if available > declared {
            return Err(ProtocolError::MalformedFrame(format!(
                "declared payload length {declared} but {available} bytes present"
            )));
        }

        Ok(Self {
            type_id,
            payload: Bytes::copy_from_slice(&bytes[HEADER_LEN..]),
        })
    }
}

/// Tokio codec for framing over a reliable ordered byte stream.
pub struct FrameCodec;

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        if src.len() < HEADER_LEN {
            return Ok(None);
        }

        let mut header = &src[..HEADER_LEN];
        let type_id = header.get_u16_le();
        let declared = header.get_u32_le() as usize;

        if declared > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::MalformedFrame(format!(
                "declared payload length {declared} exceeds maximum {MAX_PAYLOAD_SIZE}"
            )));
        }

        if src.len() < HEADER_LEN + declared {
            src.reserve(HEADER_LEN + declared - src.len());
            return Ok(None);
        }

        src.advance(HEADER_LEN);
        let payload = src.split_to(declared).freeze();
        Ok(Some(Frame { type_id, payload }))
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<()> {
        dst.reserve(HEADER_LEN + frame.payload.len());
        dst.put_u16_le(frame.type_id);
        dst.put_u32_le(frame.payload.len() as u32);
        dst.put_slice(&frame.payload);
        Ok(())
    }
}
