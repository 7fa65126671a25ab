//! Concrete packet kinds.
//!
//! Identifiers are stable wire constants and must never be renumbered:
//! `join_request=1`, `join_response=2`, `chat=3`, `start_game=4`,
//! `command=5`. Every kind round-trips exactly: `decode(encode(p)) == p`.

use bytes::Bytes;

use crate::core::codec::Frame;
use crate::core::colour::Colour;
use crate::core::wire::PacketBuffer;
use crate::error::Result;
use crate::protocol::command::RawCommand;
use crate::session::roster::UserId;

/// Identifiers for the registered packet kinds.
pub mod ids {
    pub const JOIN_REQUEST: u16 = 1;
    pub const JOIN_RESPONSE: u16 = 2;
    pub const CHAT: u16 = 3;
    pub const START_GAME: u16 = 4;
    pub const COMMAND: u16 = 5;
}

fn to_frame(type_id: u16, encode: impl FnOnce(&mut PacketBuffer)) -> Frame {
    let mut buf = PacketBuffer::new();
    encode(&mut buf);
    Frame::new(type_id, buf.into_bytes())
}

/// First packet sent to a peer when joining its game. The receiver answers
/// with a [`JoinResponsePacket`] carrying the existing roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRequestPacket {
    pub user_id: UserId,
    /// The colour the joiner wants. Only advisory when the target is not the
    /// host; the host may substitute.
    pub colour: Colour,
}

impl JoinRequestPacket {
    pub const IDENTIFIER: u16 = ids::JOIN_REQUEST;

    pub fn encode(&self, buf: &mut PacketBuffer) {
        buf.put_u32(self.user_id.0);
        self.colour.encode(buf);
    }

    pub fn decode(buf: &mut PacketBuffer) -> Result<Self> {
        Ok(Self {
            user_id: UserId(buf.get_u32()?),
            colour: Colour::decode(buf)?,
        })
    }

    pub fn into_frame(self) -> Frame {
        to_frame(Self::IDENTIFIER, |buf| self.encode(buf))
    }
}

/// Response to a join request: the map being played, the other users already
/// in the session, and the two colour fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinResponsePacket {
    pub map_name: String,
    pub other_users: Vec<UserId>,
    /// The colour held by the peer that answered.
    pub my_colour: Colour,
    /// The colour the joiner is permitted to keep. Authoritative only when
    /// the answer comes from the host.
    pub your_colour: Colour,
}

impl JoinResponsePacket {
    pub const IDENTIFIER: u16 = ids::JOIN_RESPONSE;

    pub fn encode(&self, buf: &mut PacketBuffer) {
        buf.put_string(&self.map_name);
        buf.put_count(self.other_users.len());
        for user in &self.other_users {
            buf.put_u32(user.0);
        }
        self.my_colour.encode(buf);
        self.your_colour.encode(buf);
    }

    pub fn decode(buf: &mut PacketBuffer) -> Result<Self> {
        let map_name = buf.get_string()?;
        let count = buf.get_count()?;
        let mut other_users = Vec::with_capacity(count.min(64));
        for _ in 0..count {
            other_users.push(UserId(buf.get_u32()?));
        }
        Ok(Self {
            map_name,
            other_users,
            my_colour: Colour::decode(buf)?,
            your_colour: Colour::decode(buf)?,
        })
    }

    pub fn into_frame(self) -> Frame {
        to_frame(Self::IDENTIFIER, |buf| self.encode(buf))
    }
}

/// Free-text chat, delivered to the presentation layer as soon as it is
/// dispatched. Never on the turn barrier's critical path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatPacket {
    pub msg: String,
}

impl ChatPacket {
    pub const IDENTIFIER: u16 = ids::CHAT;

    pub fn encode(&self, buf: &mut PacketBuffer) {
        buf.put_string(&self.msg);
    }

    pub fn decode(buf: &mut PacketBuffer) -> Result<Self> {
        Ok(Self {
            msg: buf.get_string()?,
        })
    }

    pub fn into_frame(self) -> Frame {
        to_frame(Self::IDENTIFIER, |buf| self.encode(buf))
    }
}

/// Sent when a peer is ready to begin simulating. Turn 0 is gated on every
/// roster peer having sent one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StartGamePacket;

impl StartGamePacket {
    pub const IDENTIFIER: u16 = ids::START_GAME;

    pub fn encode(&self, _buf: &mut PacketBuffer) {}

    pub fn decode(_buf: &mut PacketBuffer) -> Result<Self> {
        Ok(Self)
    }

    pub fn into_frame(self) -> Frame {
        Frame::new(Self::IDENTIFIER, Bytes::new())
    }
}

/// A peer's complete command set for one turn. An empty set is still sent;
/// the barrier needs an explicit contribution from every peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPacket {
    pub turn: u32,
    pub commands: Vec<RawCommand>,
}

impl CommandPacket {
    pub const IDENTIFIER: u16 = ids::COMMAND;

    pub fn encode(&self, buf: &mut PacketBuffer) {
        buf.put_u32(self.turn);
        buf.put_count(self.commands.len());
        for command in &self.commands {
            command.encode(buf);
        }
    }

    pub fn decode(buf: &mut PacketBuffer) -> Result<Self> {
        let turn = buf.get_u32()?;
        let count = buf.get_count()?;
        let mut commands = Vec::with_capacity(count.min(256));
        for _ in 0..count {
            commands.push(RawCommand::decode(buf)?);
        }
        Ok(Self { turn, commands })
    }

    pub fn into_frame(self) -> Frame {
        to_frame(Self::IDENTIFIER, |buf| self.encode(buf))
    }
}
