//! Session handshake: the join request/response exchange.
//!
//! A joining peer sends `join_request{user_id, colour}` to one target,
//! typically the host, and gets back `join_response{map_name, other_users,
//! my_colour, your_colour}`. The two colour fields carry different weight:
//! `my_colour` is simply the responder's own colour, while `your_colour` is
//! the colour the joiner is permitted to keep, and only a host answer is
//! authoritative about that. A plain peer connection has no right to
//! reassign colours; it echoes the request untouched.
//!
//! Handshake state is session-scoped and passed through the flow; there are
//! no process-wide singletons.

use tracing::{debug, instrument};

use crate::core::colour::Colour;
use crate::error::{ProtocolError, Result};
use crate::protocol::packets::{JoinRequestPacket, JoinResponsePacket};
use crate::session::roster::{Roster, UserId};

/// Who is answering a join request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authority {
    /// The session host: may substitute a free colour on collision.
    Host,
    /// An ordinary peer: reports state but cannot reassign colours.
    Peer,
}

/// Joining-side progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinProgress {
    Disconnected,
    AwaitingJoinResponse,
    Joined,
}

/// Host-side progress for one incoming connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PeerProgress {
    #[default]
    Listening,
    PeerJoining,
    PeerAccepted,
}

/// What a completed join tells the local session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    /// The colour this peer actually holds from now on.
    pub colour: Colour,
    pub map_name: String,
    /// Users already in the session, roster order.
    pub other_users: Vec<UserId>,
}

/// Joining-side handshake state.
#[derive(Debug)]
pub struct Joiner {
    user_id: UserId,
    requested_colour: Colour,
    progress: JoinProgress,
}

impl Joiner {
    pub fn new(user_id: UserId, requested_colour: Colour) -> Self {
        Self {
            user_id,
            requested_colour,
            progress: JoinProgress::Disconnected,
        }
    }

    pub fn progress(&self) -> JoinProgress {
        self.progress
    }

    /// Produce the join request and move to `AwaitingJoinResponse`.
    pub fn request(&mut self) -> JoinRequestPacket {
        self.progress = JoinProgress::AwaitingJoinResponse;
        JoinRequestPacket {
            user_id: self.user_id,
            colour: self.requested_colour,
        }
    }

    /// Apply the join response. `from_host` decides whether `your_colour`
    /// is binding; a non-host answer leaves the requested colour in place.
    #[instrument(skip(self, response))]
    pub fn complete(&mut self, response: &JoinResponsePacket, from_host: bool) -> Result<JoinOutcome> {
        if self.progress != JoinProgress::AwaitingJoinResponse {
            return Err(ProtocolError::MalformedFrame(format!(
                "join response in state {:?}",
                self.progress
            )));
        }
        self.progress = JoinProgress::Joined;

        let colour = if from_host {
            response.your_colour
        } else {
            self.requested_colour
        };
        debug!(user = %self.user_id, %colour, map = %response.map_name, "join complete");

        Ok(JoinOutcome {
            colour,
            map_name: response.map_name.clone(),
            other_users: response.other_users.clone(),
        })
    }
}

/// Validate and answer a join request, admitting the requester to the local
/// roster on success.
///
/// # Errors
/// [`ProtocolError::SessionFull`] or [`ProtocolError::ColourExhausted`]: the
/// requester is not added and the caller may close the connection.
#[instrument(skip(roster, map_name, request), fields(user = %request.user_id))]
pub fn respond_to_join(
    roster: &mut Roster,
    map_name: &str,
    responder_id: UserId,
    authority: Authority,
    request: &JoinRequestPacket,
) -> Result<JoinResponsePacket> {
    let my_colour = roster
        .get(responder_id)
        .map(|p| p.colour)
        .ok_or_else(|| ProtocolError::MalformedFrame(format!(
            "responder {responder_id} not in own roster"
        )))?;

    // Snapshot before admitting so the joiner is not in its own list.
    let other_users = roster.active_ids();

    let granted = match authority {
        Authority::Host => roster.resolve_colour(request.colour)?,
        Authority::Peer => request.colour,
    };
    roster.admit(request.user_id, granted, false)?;

    debug!(user = %request.user_id, requested = %request.colour, %granted, "peer accepted");

    Ok(JoinResponsePacket {
        map_name: map_name.to_string(),
        other_users,
        my_colour,
        your_colour: granted,
    })
}
