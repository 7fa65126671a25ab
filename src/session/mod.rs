//! # Session Layer
//!
//! Everything above the wire: who is in the match, which turn the barrier
//! is holding, and the event stream the simulation consumes.
//!
//! ## Components
//!
//! - [`roster`]: peer membership and colour bookkeeping
//! - [`turns`]: the lockstep turn engine (barriers, windows, buffering)
//! - [`events`]: conditions surfaced to the embedding application
//! - [`service`]: the async [`Session`](service::Session) tying it together

pub mod events;
pub mod roster;
pub mod service;
pub mod turns;
