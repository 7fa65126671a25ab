//! Opaque command envelope.
//!
//! Commands are produced by the simulation layer; this protocol only carries
//! them. Each command declares a small type tag and encodes its own payload,
//! so a command packet holds an ordered sequence of heterogeneous commands
//! without this layer knowing their semantics.
//!
//! [`RawCommand`] is the wire-side value: once a simulation command is handed
//! to the protocol it is serialized and the protocol owns the bytes, not the
//! simulation object. [`CommandRegistry`] is a second registry with the same
//! structure as the packet dispatcher, scoped to command tags, used at the
//! simulation boundary to turn raw commands back into typed ones.

use std::collections::HashMap;
use std::fmt::Debug;

use bytes::Bytes;
use tracing::debug;

use crate::core::wire::PacketBuffer;
use crate::error::{ProtocolError, Result};

/// A serialized command as it travels inside a command packet:
/// `[tag: u16][payload_len: u32][payload]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCommand {
    pub tag: u16,
    pub payload: Bytes,
}

impl RawCommand {
    pub fn encode(&self, buf: &mut PacketBuffer) {
        buf.put_u16(self.tag);
        buf.put_blob(&self.payload);
    }

    pub fn decode(buf: &mut PacketBuffer) -> Result<Self> {
        let tag = buf.get_u16()?;
        let payload = buf.get_blob()?;
        Ok(Self { tag, payload })
    }
}

/// A simulation-side command object the protocol can serialize.
pub trait Command: Debug + Send {
    /// Stable tag identifying this command kind. Unique per registry.
    fn tag(&self) -> u16;

    /// Encode this command's payload (tag excluded; the envelope writes it).
    fn encode_payload(&self, buf: &mut PacketBuffer);
}

/// Decoder for one command kind.
pub type CommandDecoder = fn(&mut PacketBuffer) -> Result<Box<dyn Command>>;

/// Registry mapping command tags to decoders. Constructed explicitly and
/// handed to whoever needs it; there is no process-wide instance.
#[derive(Default)]
pub struct CommandRegistry {
    decoders: HashMap<u16, CommandDecoder>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Register a decoder for `tag`. Registering the same tag twice is a
    /// configuration bug and fails fast.
    pub fn register(&mut self, tag: u16, decoder: CommandDecoder) -> Result<()> {
        if self.decoders.contains_key(&tag) {
            return Err(ProtocolError::DuplicateRegistration(tag));
        }
        self.decoders.insert(tag, decoder);
        debug!(tag, "command decoder registered");
        Ok(())
    }

    /// Serialize a command into its wire form.
    pub fn encode(&self, command: &dyn Command) -> RawCommand {
        let mut buf = PacketBuffer::new();
        command.encode_payload(&mut buf);
        RawCommand {
            tag: command.tag(),
            payload: buf.into_bytes(),
        }
    }

    /// Decode a raw command back into a typed one.
    pub fn decode(&self, raw: &RawCommand) -> Result<Box<dyn Command>> {
        let decoder = self
            .decoders
            .get(&raw.tag)
            .ok_or(ProtocolError::UnknownCommandTag(raw.tag))?;
        let mut buf = PacketBuffer::from_bytes(raw.payload.clone());
        decoder(&mut buf)
    }
}
