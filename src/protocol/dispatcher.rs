//! Packet registry and dispatch.
//!
//! The dispatcher maps the 16-bit type identifier in a frame header to a
//! registered handler. It is an explicit object, constructed at session
//! start and owned by the session; there is no process-wide registry.
//!
//! Registration of a duplicate identifier fails fast: silently overwriting a
//! handler would leave two packet kinds claiming one wire id. Dispatch of an
//! unregistered identifier returns [`ProtocolError::UnknownType`], which the
//! caller logs and discards: newer peers may legitimately send packet kinds
//! this build does not know, and that must never tear down the connection.

use std::collections::HashMap;

use tracing::debug;

use crate::core::codec::Frame;
use crate::core::wire::PacketBuffer;
use crate::error::{ProtocolError, Result};
use crate::session::roster::UserId;

type HandlerFn = dyn Fn(UserId, PacketBuffer) -> Result<()> + Send + Sync + 'static;

/// Routes inbound frames to per-packet-kind handlers.
#[derive(Default)]
pub struct PacketDispatcher {
    handlers: HashMap<u16, Box<HandlerFn>>,
}

impl PacketDispatcher {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register `handler` for frames tagged `type_id`.
    ///
    /// # Errors
    /// [`ProtocolError::DuplicateRegistration`] if the identifier is taken.
    pub fn register<F>(&mut self, type_id: u16, handler: F) -> Result<()>
    where
        F: Fn(UserId, PacketBuffer) -> Result<()> + Send + Sync + 'static,
    {
        if self.handlers.contains_key(&type_id) {
            return Err(ProtocolError::DuplicateRegistration(type_id));
        }
        self.handlers.insert(type_id, Box::new(handler));
        debug!(type_id, "packet handler registered");
        Ok(())
    }

    /// Route one frame from `from` to its handler.
    ///
    /// # Errors
    /// [`ProtocolError::UnknownType`] when no handler is registered for the
    /// frame's identifier; whatever the handler itself returns otherwise.
    pub fn dispatch(&self, from: UserId, frame: Frame) -> Result<()> {
        let handler = self
            .handlers
            .get(&frame.type_id)
            .ok_or(ProtocolError::UnknownType(frame.type_id))?;
        handler(from, PacketBuffer::from_bytes(frame.payload))
    }
}
