//! # Error Types
//!
//! Error taxonomy for the lockstep protocol core.
//!
//! The taxonomy mirrors the recovery policy: codec and dispatch errors are
//! recovered locally (the offending frame is dropped and the stream keeps
//! going), handshake errors reject only the offending join attempt, and
//! turn-engine fatals abort the whole session exactly once.
//!
//! ## Error Categories
//! - **Codec**: malformed or truncated frames, unknown identifiers
//! - **Handshake**: session full, colour pool exhausted
//! - **Turn engine**: duplicate submissions, pending-turn overflow, abort
//! - **Ambient**: I/O, configuration, transport failures

use std::io;
use thiserror::Error;

use crate::session::roster::UserId;

/// Primary error type for all protocol operations.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The declared frame layout does not match the bytes on the wire.
    /// The frame is discarded; the connection may continue.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// Fewer bytes were available than the frame header promised.
    #[error("truncated frame: needed {needed} bytes, {available} available")]
    TruncatedFrame { needed: usize, available: usize },

    /// No decoder registered for this packet identifier. Forward-compatible:
    /// callers log and discard rather than tearing the connection down.
    #[error("unknown packet type: {0}")]
    UnknownType(u16),

    /// Two decoders registered for one identifier. This is a configuration
    /// bug and fails fast at registration time, never at dispatch time.
    #[error("duplicate registration for identifier {0}")]
    DuplicateRegistration(u16),

    /// No decoder registered for a command tag inside a command packet.
    #[error("unknown command tag: {0}")]
    UnknownCommandTag(u16),

    /// A second command set arrived for a (peer, turn) slot that already
    /// holds one. The first submission stands; this is a logged anomaly.
    #[error("duplicate submission from user {user} for turn {turn}")]
    DuplicateSubmission { user: UserId, turn: u32 },

    /// A command set arrived for a turn this engine has already closed.
    #[error("submission from user {user} for closed turn {turn}")]
    StaleSubmission { user: UserId, turn: u32 },

    /// The roster cannot accept another peer.
    #[error("session full: {max} players already joined")]
    SessionFull { max: usize },

    /// No free colour remains in the palette for a joining peer.
    #[error("colour pool exhausted")]
    ColourExhausted,

    /// A local operation (ready, submit) was attempted before the local
    /// peer's own join handshake completed. Without a converged roster the
    /// start barrier would pass with only the local peer in it.
    #[error("join handshake not complete")]
    JoinIncomplete,

    /// More turns buffered ahead of the window than the configured limit
    /// allows. Fatal desynchronization; the session aborts.
    #[error("pending turn overflow: turn {turn} exceeds limit of {limit} buffered turns")]
    PendingTurnOverflow { turn: u32, limit: usize },

    /// Terminal condition: the session can make no further progress. Surfaced
    /// once; after this the engine accepts no further input.
    #[error("session aborted: {0}")]
    SessionAborted(String),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("transport error: {0}")]
    TransportError(String),

    #[error("connection closed")]
    ConnectionClosed,
}

/// Type alias for Results using ProtocolError.
pub type Result<T> = std::result::Result<T, ProtocolError>;
