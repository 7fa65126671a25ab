//! Player colours.
//!
//! A colour is a plain 3-channel RGB value. It doubles as a roster invariant:
//! no two active peers in a session ever hold the same colour, so the
//! handshake allocates from [`PALETTE`] when a requested colour collides.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::wire::PacketBuffer;
use crate::error::Result;

/// 3-channel display colour. Encoded on the wire as three bytes (r, g, b).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Colour {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Colour {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const RED: Colour = Colour::new(0xFF, 0x00, 0x00);
    pub const BLUE: Colour = Colour::new(0x00, 0x00, 0xFF);
    pub const GREEN: Colour = Colour::new(0x00, 0xFF, 0x00);
    pub const YELLOW: Colour = Colour::new(0xFF, 0xFF, 0x00);
    pub const CYAN: Colour = Colour::new(0x00, 0xFF, 0xFF);
    pub const MAGENTA: Colour = Colour::new(0xFF, 0x00, 0xFF);
    pub const ORANGE: Colour = Colour::new(0xFF, 0x7F, 0x00);
    pub const WHITE: Colour = Colour::new(0xFF, 0xFF, 0xFF);

    pub fn encode(&self, buf: &mut PacketBuffer) {
        buf.put_u8(self.r);
        buf.put_u8(self.g);
        buf.put_u8(self.b);
    }

    pub fn decode(buf: &mut PacketBuffer) -> Result<Self> {
        Ok(Self {
            r: buf.get_u8()?,
            g: buf.get_u8()?,
            b: buf.get_u8()?,
        })
    }
}

impl fmt::Display for Colour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// Allocation pool for player colours. Its length bounds how many peers can
/// hold distinct colours, independent of the configured player cap.
pub const PALETTE: [Colour; 8] = [
    Colour::RED,
    Colour::BLUE,
    Colour::GREEN,
    Colour::YELLOW,
    Colour::CYAN,
    Colour::MAGENTA,
    Colour::ORANGE,
    Colour::WHITE,
];
