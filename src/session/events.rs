//! Events surfaced to the simulation and presentation layers.
//!
//! The protocol core emits typed conditions only; anything user-visible is
//! the presentation collaborator's business. Events are delivered over an
//! mpsc channel so the consumer never runs inside the session lock.

use crate::core::colour::Colour;
use crate::protocol::command::RawCommand;
use crate::session::roster::UserId;

/// Outbound collaborator interface, as an event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A peer was admitted to the roster.
    PeerJoined { user: UserId, colour: Colour },

    /// A peer's connection dropped or it left.
    PeerDeparted { user: UserId },

    /// Every roster peer sent `start_game`; turn 0 is open.
    GameStarted,

    /// A turn's barrier passed: the merged, peer-id-ordered command sequence
    /// for `turn`. Emitted exactly once per turn, in turn order.
    TurnReady { turn: u32, commands: Vec<RawCommand> },

    /// Chat text, delivered immediately on dispatch with no ordering
    /// relationship to turns.
    Chat { from: UserId, text: String },

    /// Terminal condition; no further events follow.
    Aborted { reason: String },
}
