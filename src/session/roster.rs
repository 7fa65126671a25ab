//! Session roster: the ordered set of currently joined peers.
//!
//! The roster is the sole owner of peer records. Connections and the turn
//! engine refer to peers by [`UserId`] only; nothing holds a pointer back
//! into the session. Mutation happens only through the handshake path
//! (admit) and the departure path (mark_departed); the turn engine reads.
//!
//! Invariant: no two active peers hold the same colour.

use tracing::warn;

use crate::core::colour::{Colour, PALETTE};
use crate::error::{ProtocolError, Result};

/// Opaque session-unique user identifier, assigned by the host on join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UserId(pub u32);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One participant. Created on accepted join, marked departed when its
/// connection drops; records are never removed mid-session so roster
/// positions stay stable.
#[derive(Debug, Clone)]
pub struct Peer {
    pub user_id: UserId,
    pub colour: Colour,
    pub is_host: bool,
    pub departed: bool,
}

/// Live set of joined peers for one session.
#[derive(Debug)]
pub struct Roster {
    peers: Vec<Peer>,
    max_players: usize,
}

impl Roster {
    pub fn new(max_players: usize) -> Self {
        Self {
            peers: Vec::new(),
            max_players,
        }
    }

    /// Number of peers that have not departed.
    pub fn active_count(&self) -> usize {
        self.peers.iter().filter(|p| !p.departed).count()
    }

    /// Ids of peers that have not departed, in roster order.
    pub fn active_ids(&self) -> Vec<UserId> {
        self.peers
            .iter()
            .filter(|p| !p.departed)
            .map(|p| p.user_id)
            .collect()
    }

    /// All ids ever admitted, in roster order.
    pub fn all_ids(&self) -> Vec<UserId> {
        self.peers.iter().map(|p| p.user_id).collect()
    }

    pub fn get(&self, user_id: UserId) -> Option<&Peer> {
        self.peers.iter().find(|p| p.user_id == user_id)
    }

    pub fn contains(&self, user_id: UserId) -> bool {
        self.get(user_id).is_some()
    }

    pub fn colour_in_use(&self, colour: Colour) -> bool {
        self.peers.iter().any(|p| !p.departed && p.colour == colour)
    }

    /// First palette colour not held by an active peer.
    pub fn free_colour(&self) -> Option<Colour> {
        PALETTE.into_iter().find(|c| !self.colour_in_use(*c))
    }

    /// Resolve a requested colour against the uniqueness invariant: the
    /// request is granted if free, otherwise a free palette colour is
    /// substituted.
    ///
    /// # Errors
    /// [`ProtocolError::ColourExhausted`] when nothing is free.
    pub fn resolve_colour(&self, requested: Colour) -> Result<Colour> {
        if !self.colour_in_use(requested) {
            return Ok(requested);
        }
        self.free_colour().ok_or(ProtocolError::ColourExhausted)
    }

    /// Admit a peer with an already-resolved colour.
    ///
    /// # Errors
    /// [`ProtocolError::SessionFull`] at capacity. A colour collision is not
    /// an error here (a non-host responder has no authority to reassign) but
    /// it is logged as an anomaly: by the time a peer reaches us, the host
    /// should already have arbitrated its colour.
    pub fn admit(&mut self, user_id: UserId, colour: Colour, is_host: bool) -> Result<()> {
        if self.active_count() >= self.max_players {
            return Err(ProtocolError::SessionFull {
                max: self.max_players,
            });
        }
        if self.contains(user_id) {
            return Err(ProtocolError::MalformedFrame(format!(
                "user {user_id} already in roster"
            )));
        }
        if self.colour_in_use(colour) {
            warn!(user = %user_id, %colour, "admitting peer with colliding colour");
        }
        self.peers.push(Peer {
            user_id,
            colour,
            is_host,
            departed: false,
        });
        Ok(())
    }

    /// Mark a peer departed. Returns false when the id is unknown or the
    /// peer had already departed.
    pub fn mark_departed(&mut self, user_id: UserId) -> bool {
        match self.peers.iter_mut().find(|p| p.user_id == user_id) {
            Some(peer) if !peer.departed => {
                peer.departed = true;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admit_and_lookup() {
        let mut roster = Roster::new(4);
        roster.admit(UserId(1), Colour::RED, true).unwrap();
        roster.admit(UserId(2), Colour::BLUE, false).unwrap();

        assert_eq!(roster.active_count(), 2);
        assert!(roster.get(UserId(1)).unwrap().is_host);
        assert!(!roster.get(UserId(2)).unwrap().is_host);
        assert_eq!(roster.active_ids(), vec![UserId(1), UserId(2)]);
    }

    #[test]
    fn capacity_is_enforced() {
        let mut roster = Roster::new(2);
        roster.admit(UserId(1), Colour::RED, true).unwrap();
        roster.admit(UserId(2), Colour::BLUE, false).unwrap();
        assert!(matches!(
            roster.admit(UserId(3), Colour::GREEN, false),
            Err(ProtocolError::SessionFull { max: 2 })
        ));
    }

    #[test]
    fn duplicate_user_rejected() {
        let mut roster = Roster::new(4);
        roster.admit(UserId(1), Colour::RED, true).unwrap();
        assert!(roster.admit(UserId(1), Colour::BLUE, false).is_err());
    }

    #[test]
    fn colour_resolution_substitutes_on_collision() {
        let mut roster = Roster::new(8);
        roster.admit(UserId(1), Colour::RED, true).unwrap();

        // Free colour granted as requested.
        assert_eq!(roster.resolve_colour(Colour::GREEN).unwrap(), Colour::GREEN);
        // Collision substituted with the first free palette entry.
        assert_eq!(roster.resolve_colour(Colour::RED).unwrap(), Colour::BLUE);
    }

    #[test]
    fn departed_peer_frees_its_colour() {
        let mut roster = Roster::new(8);
        roster.admit(UserId(1), Colour::RED, true).unwrap();
        roster.admit(UserId(2), Colour::BLUE, false).unwrap();

        assert!(roster.mark_departed(UserId(2)));
        assert!(!roster.mark_departed(UserId(2)), "second mark is a no-op");
        assert!(!roster.colour_in_use(Colour::BLUE));
        assert_eq!(roster.active_ids(), vec![UserId(1)]);
    }

    #[test]
    fn colour_exhaustion_reported() {
        let mut roster = Roster::new(64);
        for (i, colour) in PALETTE.into_iter().enumerate() {
            roster.admit(UserId(i as u32), colour, i == 0).unwrap();
        }
        assert!(matches!(
            roster.resolve_colour(Colour::RED),
            Err(ProtocolError::ColourExhausted)
        ));
    }
}
