//! # Protocol Layer
//!
//! Typed packets and the stateful exchanges built on top of framing.
//!
//! ## Components
//! - **packets**: the five wire packet kinds with stable identifiers
//! - **dispatcher**: explicit packet registry; routes frames to handlers
//! - **command**: opaque tagged command envelope plus its own registry
//! - **handshake**: join request/response state machines and colour rules

pub mod command;
pub mod dispatcher;
pub mod handshake;
pub mod packets;
