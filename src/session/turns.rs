//! Turn synchronization engine: the lockstep core.
//!
//! Every peer runs an identical copy of this state machine. It collects each
//! peer's per-turn command set, holds a barrier so no peer advances past turn
//! N until all of turn N's contributions are in, and hands the simulation a
//! merged, peer-id-ordered command stream.
//!
//! The engine is deliberately synchronous and transport-free: inputs arrive
//! as method calls (one per received packet or departure event), outputs come
//! back as [`EngineOutput`] values for the caller to deliver. The session
//! service serializes all calls behind one lock, so barrier evaluation always
//! sees a consistent membership snapshot.
//!
//! Rules enforced here:
//! - a peer's command set for a turn is immutable once recorded; a second
//!   set for the same (peer, turn) is discarded as a `DuplicateSubmission`;
//! - turn N closes exactly once, when every peer snapshotted at N's opening
//!   has submitted or departed (departed peers contribute an empty set);
//! - packets up to `window` turns ahead of the current turn are recorded
//!   directly; farther ones are buffered, and exceeding `pending_limit`
//!   buffered turns is a fatal desynchronization;
//! - turn 0 is additionally gated on the start barrier: every member must
//!   send `start_game` before anything is delivered;
//! - after an abort the engine accepts no further input and emits nothing.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use crate::error::{ProtocolError, Result};
use crate::protocol::command::RawCommand;
use crate::session::roster::UserId;

/// What the engine tells the session layer after consuming an input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineOutput {
    /// The start barrier passed; turn 0 is open.
    Started,
    /// Turn `turn` closed: the merged, peer-id-ordered command sequence is
    /// ready for the simulation.
    TurnReady { turn: u32, commands: Vec<RawCommand> },
    /// Fatal: the session can make no further progress.
    Aborted { reason: String },
}

/// Per-turn collection state.
#[derive(Debug, Default)]
struct TurnState {
    /// Membership snapshot taken when this turn opened. Empty until then.
    required: BTreeSet<UserId>,
    opened: bool,
    /// Recorded command sets, keyed by peer. BTreeMap ordering is the
    /// delivery ordering.
    submissions: BTreeMap<UserId, Vec<RawCommand>>,
}

/// Lockstep turn engine. One per session, shared by all receive paths.
#[derive(Debug)]
pub struct TurnEngine {
    current: u32,
    started: bool,
    aborted: bool,
    /// All peers ever added, including the local one.
    members: BTreeSet<UserId>,
    departed: BTreeSet<UserId>,
    start_arrived: BTreeSet<UserId>,
    /// Turns at or ahead of `current`, within the window.
    turns: BTreeMap<u32, TurnState>,
    /// Command sets for turns beyond the window, waiting for the local turn
    /// counter to catch up.
    pending: BTreeMap<u32, Vec<(UserId, Vec<RawCommand>)>>,
    window: u32,
    pending_limit: usize,
}

impl TurnEngine {
    pub fn new(window: u32, pending_limit: usize) -> Self {
        Self {
            current: 0,
            started: false,
            aborted: false,
            members: BTreeSet::new(),
            departed: BTreeSet::new(),
            start_arrived: BTreeSet::new(),
            turns: BTreeMap::new(),
            pending: BTreeMap::new(),
            window: window.max(1),
            pending_limit,
        }
    }

    pub fn current_turn(&self) -> u32 {
        self.current
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    fn active(&self) -> BTreeSet<UserId> {
        self.members.difference(&self.departed).copied().collect()
    }

    /// Add a peer to the engine's membership mirror. Peers added after a
    /// turn opened are not required for that turn; they join the snapshot of
    /// the next one.
    pub fn add_peer(&mut self, user: UserId) {
        if self.aborted {
            return;
        }
        self.members.insert(user);
    }

    /// Record a peer's start-barrier contribution. The match delivers
    /// nothing until every active member has one.
    pub fn record_start(&mut self, user: UserId) -> Vec<EngineOutput> {
        if self.aborted {
            return Vec::new();
        }
        if !self.start_arrived.insert(user) {
            debug!(user = %user, "duplicate start_game ignored");
            return Vec::new();
        }
        self.try_start()
    }

    /// Record a command set for (turn, user).
    ///
    /// # Errors
    /// - [`ProtocolError::StaleSubmission`] for a turn already closed;
    /// - [`ProtocolError::DuplicateSubmission`] when the slot is taken.
    /// Both are anomalies the caller logs; neither advances nor corrupts the
    /// barrier. A fatal pending-turn overflow is reported through the
    /// returned outputs, not the error channel.
    pub fn record(
        &mut self,
        user: UserId,
        turn: u32,
        commands: Vec<RawCommand>,
    ) -> Result<Vec<EngineOutput>> {
        if self.aborted {
            debug!(user = %user, turn, "input after abort dropped");
            return Ok(Vec::new());
        }
        if turn < self.current {
            return Err(ProtocolError::StaleSubmission { user, turn });
        }
        if turn >= self.current + self.window {
            return Ok(self.buffer_ahead(user, turn, commands));
        }

        self.insert_submission(user, turn, commands)?;
        Ok(self.evaluate())
    }

    /// Mark a peer departed and re-evaluate every turn blocked only on it.
    /// A departed peer contributes an empty set, so the barrier cannot stall
    /// on someone who will never answer.
    pub fn mark_departed(&mut self, user: UserId) -> Vec<EngineOutput> {
        if self.aborted || !self.members.contains(&user) {
            return Vec::new();
        }
        if !self.departed.insert(user) {
            return Vec::new();
        }
        debug!(user = %user, turn = self.current, "peer departed");

        if self.active().is_empty() {
            return vec![self.abort("all peers departed")];
        }

        if !self.started {
            // A departing lobby peer may have been the last one holding up
            // the start barrier.
            return self.try_start();
        }
        self.evaluate()
    }

    fn try_start(&mut self) -> Vec<EngineOutput> {
        if self.started {
            return self.evaluate();
        }
        let active = self.active();
        if active.is_empty() || !active.iter().all(|u| self.start_arrived.contains(u)) {
            return Vec::new();
        }
        self.started = true;
        self.open_turn(self.current);
        debug!(members = active.len(), "start barrier passed");

        let mut outputs = vec![EngineOutput::Started];
        outputs.extend(self.evaluate());
        outputs
    }

    fn open_turn(&mut self, turn: u32) {
        let active = self.active();
        let state = self.turns.entry(turn).or_default();
        state.required = active;
        state.opened = true;
    }

    fn insert_submission(
        &mut self,
        user: UserId,
        turn: u32,
        commands: Vec<RawCommand>,
    ) -> Result<()> {
        let state = self.turns.entry(turn).or_default();
        if state.submissions.contains_key(&user) {
            return Err(ProtocolError::DuplicateSubmission { user, turn });
        }
        state.submissions.insert(user, commands);
        Ok(())
    }

    fn buffer_ahead(&mut self, user: UserId, turn: u32, commands: Vec<RawCommand>) -> Vec<EngineOutput> {
        self.pending.entry(turn).or_default().push((user, commands));
        if self.pending.len() > self.pending_limit {
            let err = ProtocolError::PendingTurnOverflow {
                turn,
                limit: self.pending_limit,
            };
            return vec![self.abort(&err.to_string())];
        }
        debug!(user = %user, turn, current = self.current, "command packet buffered ahead of window");
        Vec::new()
    }

    /// Drain buffered submissions that have come within the window.
    fn absorb_pending(&mut self) {
        let horizon = self.current + self.window;
        let in_window: Vec<u32> = self
            .pending
            .keys()
            .copied()
            .take_while(|t| *t < horizon)
            .collect();
        for turn in in_window {
            if let Some(entries) = self.pending.remove(&turn) {
                for (user, commands) in entries {
                    if let Err(e) = self.insert_submission(user, turn, commands) {
                        warn!(error = %e, "buffered submission discarded");
                    }
                }
            }
        }
    }

    /// Close every consecutive turn whose barrier is satisfied, starting at
    /// the current one. Closing N opens N+1 with a fresh snapshot, which may
    /// itself already be complete (cascade).
    fn evaluate(&mut self) -> Vec<EngineOutput> {
        let mut outputs = Vec::new();
        if !self.started || self.aborted {
            return outputs;
        }

        loop {
            let Some(state) = self.turns.get(&self.current) else {
                // Current turn opened but no state yet: only possible when
                // the snapshot was empty, which abort handling precludes.
                self.open_turn(self.current);
                continue;
            };
            if !state.opened {
                self.open_turn(self.current);
                continue;
            }

            let closed = state
                .required
                .iter()
                .all(|u| state.submissions.contains_key(u) || self.departed.contains(u));
            if !closed {
                break;
            }

            // required is never empty here: an empty active set aborts the
            // session before evaluation runs.
            let state = self
                .turns
                .remove(&self.current)
                .unwrap_or_default();
            let commands: Vec<RawCommand> = state
                .submissions
                .into_values()
                .flatten()
                .collect();

            let turn = self.current;
            debug!(turn, commands = commands.len(), "turn closed");
            outputs.push(EngineOutput::TurnReady { turn, commands });

            self.current += 1;
            self.open_turn(self.current);
            self.absorb_pending();
        }
        outputs
    }

    fn abort(&mut self, reason: &str) -> EngineOutput {
        warn!(reason, "session aborted");
        self.aborted = true;
        self.turns.clear();
        self.pending.clear();
        EngineOutput::Aborted {
            reason: reason.to_string(),
        }
    }
}
