//! # Core Wire Components
//!
//! Low-level framing and binary serialization.
//!
//! This module is semantics-free: it knows how to turn bytes into frames and
//! frames into bytes, and nothing about what the payloads mean.
//!
//! ## Components
//! - **PacketBuffer**: little-endian primitive encode/decode over a payload
//! - **Frame / FrameCodec**: `[type_id: u16][payload_len: u32][payload]`
//!   framing, strict single-frame parsing and tokio streaming variants
//! - **Colour**: 3-channel player colour with wire encoding and palette
//!
//! ## Wire Format
//! ```text
//! [TypeId(2, LE)] [PayloadLen(4, LE)] [Payload(N)]
//! ```
//!
//! Length validation happens before allocation; a frame declaring more than
//! `MAX_PAYLOAD_SIZE` bytes is rejected as malformed.

pub mod codec;
pub mod colour;
pub mod wire;
