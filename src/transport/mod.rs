//! # Transport Abstraction
//!
//! The protocol core is transport-agnostic: it needs a way to push frame
//! bytes to a peer and a stream of inbound events, and assumes each
//! peer-pair link is a reliable, ordered byte stream. Anything satisfying
//! that (TCP, unix sockets, an in-memory channel) can carry a session.
//!
//! Delivery reliability is the transport's job; this layer never retries or
//! acknowledges.

use bytes::Bytes;

use crate::error::Result;
use crate::session::roster::UserId;

pub mod local;

/// Inbound side of a transport: what arrives from other peers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    /// One complete frame from `from`.
    Frame { from: UserId, bytes: Bytes },
    /// The link to `from` closed.
    Disconnected { from: UserId },
}

/// Outbound side of a transport.
///
/// `send` and `broadcast` hand bytes to the transport without blocking the
/// caller on peer backpressure; the session layer snapshots payloads and
/// releases its lock before calling either.
pub trait Transport: Send + Sync {
    /// Send one frame's bytes to a single peer.
    fn send(&self, to: UserId, bytes: Bytes) -> Result<()>;

    /// Send one frame's bytes to every connected peer.
    fn broadcast(&self, bytes: Bytes) -> Result<()>;
}
