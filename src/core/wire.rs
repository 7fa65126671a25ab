//! Little-endian wire primitives.
//!
//! `PacketBuffer` is the single place packet payloads are read from and
//! written to. All numeric fields are fixed-width little-endian, strings are
//! length-prefixed UTF-8 (u32 length + bytes), and sequences are
//! count-prefixed (u32 count followed by that many encoded elements). There
//! is no padding and no alignment; a payload is exactly the bytes its fields
//! produce, in order.
//!
//! Reads fail with [`ProtocolError::TruncatedFrame`] when fewer bytes remain
//! than the next field requires. The buffer knows nothing about packet
//! semantics; that lives in `protocol::packets`.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{ProtocolError, Result};

/// Cursor over a packet payload, for both encoding and decoding.
#[derive(Debug, Default)]
pub struct PacketBuffer {
    buf: BytesMut,
}

impl PacketBuffer {
    /// New empty buffer for encoding.
    pub fn new() -> Self {
        Self {
            buf: BytesMut::new(),
        }
    }

    /// Wrap received payload bytes for decoding.
    pub fn from_bytes(bytes: Bytes) -> Self {
        Self {
            buf: BytesMut::from(&bytes[..]),
        }
    }

    /// Consume the buffer, yielding the encoded payload.
    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }

    /// Bytes not yet consumed by reads.
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn ensure(&self, needed: usize) -> Result<()> {
        let available = self.buf.remaining();
        if available < needed {
            return Err(ProtocolError::TruncatedFrame { needed, available });
        }
        Ok(())
    }

    pub fn put_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    pub fn get_u8(&mut self) -> Result<u8> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    pub fn put_u16(&mut self, value: u16) {
        self.buf.put_u16_le(value);
    }

    pub fn get_u16(&mut self) -> Result<u16> {
        self.ensure(2)?;
        Ok(self.buf.get_u16_le())
    }

    pub fn put_u32(&mut self, value: u32) {
        self.buf.put_u32_le(value);
    }

    pub fn get_u32(&mut self) -> Result<u32> {
        self.ensure(4)?;
        Ok(self.buf.get_u32_le())
    }

    /// Length-prefixed UTF-8 string: u32 byte length, then the bytes.
    pub fn put_string(&mut self, value: &str) {
        self.buf.put_u32_le(value.len() as u32);
        self.buf.put_slice(value.as_bytes());
    }

    pub fn get_string(&mut self) -> Result<String> {
        let len = self.get_u32()? as usize;
        self.ensure(len)?;
        let raw = self.buf.split_to(len);
        String::from_utf8(raw.to_vec())
            .map_err(|e| ProtocolError::MalformedFrame(format!("invalid UTF-8 in string: {e}")))
    }

    /// Length-prefixed opaque bytes: u32 byte length, then the bytes.
    pub fn put_blob(&mut self, value: &[u8]) {
        self.buf.put_u32_le(value.len() as u32);
        self.buf.put_slice(value);
    }

    pub fn get_blob(&mut self) -> Result<Bytes> {
        let len = self.get_u32()? as usize;
        self.ensure(len)?;
        Ok(self.buf.split_to(len).freeze())
    }

    /// Count prefix for a sequence: u32 element count.
    pub fn put_count(&mut self, count: usize) {
        self.buf.put_u32_le(count as u32);
    }

    pub fn get_count(&mut self) -> Result<usize> {
        Ok(self.get_u32()? as usize)
    }
}
