//! # Lockstep Protocol
//!
//! Peer-to-peer networking for deterministic lockstep simulations: a length
//! prefixed wire format, an extensible packet dispatcher, a join handshake
//! with host-arbitrated colour assignment, and a turn engine that releases
//! each simulation turn only once every peer's commands for it have arrived.
//!
//! ## Layers
//!
//! - [`core`](crate::core): byte-level building blocks, namely
//!   [`wire`](crate::core::wire) buffers, the [`codec`](crate::core::codec)
//!   frame format and player [`colour`](crate::core::colour)s
//! - [`protocol`]: packet definitions, the dispatcher and command
//!   registries, and the join handshake state machines
//! - [`session`]: roster, turn engine, and the async [`Session`] service
//! - [`transport`]: the byte-stream abstraction sessions run over
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use lockstep_protocol::{LocalHub, Session, SessionConfig, UserId};
//! use tokio_stream::wrappers::UnboundedReceiverStream;
//!
//! # async fn demo() -> lockstep_protocol::Result<()> {
//! let hub = LocalHub::new();
//! let (endpoint, inbox) = hub.attach(UserId(1))?;
//! let (session, mut events) =
//!     Session::host(SessionConfig::default(), Arc::new(endpoint), UserId(1))?;
//!
//! tokio::spawn(async move { session.run(UnboundedReceiverStream::new(inbox)).await });
//! while let Some(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod session;
pub mod transport;

pub use crate::config::SessionConfig;
pub use crate::core::codec::{Frame, FrameCodec};
pub use crate::core::colour::{Colour, PALETTE};
pub use crate::error::{ProtocolError, Result};
pub use crate::protocol::command::{Command, CommandRegistry, RawCommand};
pub use crate::protocol::dispatcher::PacketDispatcher;
pub use crate::protocol::handshake::{Authority, Joiner};
pub use crate::protocol::packets::{
    ChatPacket, CommandPacket, JoinRequestPacket, JoinResponsePacket, StartGamePacket,
};
pub use crate::session::events::SessionEvent;
pub use crate::session::roster::{Roster, UserId};
pub use crate::session::service::Session;
pub use crate::session::turns::{EngineOutput, TurnEngine};
pub use crate::transport::local::{LocalEndpoint, LocalHub};
pub use crate::transport::{PeerEvent, Transport};
