//! Session service: the stateful glue between transport and simulation.
//!
//! One `Session` per participating process. All mutable protocol state
//! (roster + turn engine) lives behind a single mutex, so every receive path
//! and the local submit path observe a consistent snapshot; barrier
//! evaluation depends on that. The lock is never held across a transport send:
//! payloads are built under the lock, then sent after it is released.
//!
//! Inbound flow: transport events arrive via [`run`](Session::run) (or
//! [`handle_frame`](Session::handle_frame) directly), frames are parsed and
//! routed through the packet dispatcher, and whatever the engine produces is
//! forwarded to the simulation as [`SessionEvent`]s. Codec and dispatch
//! errors drop the offending frame and keep the stream alive; handshake
//! errors reject only that join; engine fatals abort the session once.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::{Stream, StreamExt};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

use crate::config::SessionConfig;
use crate::core::codec::Frame;
use crate::core::colour::{Colour, PALETTE};
use crate::error::{ProtocolError, Result};
use crate::protocol::command::RawCommand;
use crate::protocol::dispatcher::PacketDispatcher;
use crate::protocol::handshake::{self, Authority, Joiner};
use crate::protocol::packets::{
    ids, ChatPacket, CommandPacket, JoinRequestPacket, JoinResponsePacket, StartGamePacket,
};
use crate::session::events::SessionEvent;
use crate::session::roster::{Roster, UserId};
use crate::session::turns::{EngineOutput, TurnEngine};
use crate::transport::{PeerEvent, Transport};

struct State {
    map_name: String,
    roster: Roster,
    engine: TurnEngine,
    /// Present while our own join is in flight.
    joiner: Option<Joiner>,
    /// The peer our join request went to (treated as the host).
    join_target: Option<UserId>,
    /// Peers we still owe a pairwise handshake after joining.
    pending_peer_joins: BTreeSet<UserId>,
}

type SharedState = Arc<Mutex<State>>;

fn lock(state: &SharedState) -> Result<MutexGuard<'_, State>> {
    state
        .lock()
        .map_err(|_| ProtocolError::TransportError("session state lock poisoned".to_string()))
}

/// A peer's protocol endpoint for one match.
pub struct Session {
    local_id: UserId,
    is_host: bool,
    state: SharedState,
    dispatcher: PacketDispatcher,
    transport: Arc<dyn Transport>,
    events: UnboundedSender<SessionEvent>,
}

impl Session {
    /// Create the hosting session. The host is itself a peer with a
    /// reserved, implicit join: it takes the first palette colour.
    pub fn host(
        config: SessionConfig,
        transport: Arc<dyn Transport>,
        local_id: UserId,
    ) -> Result<(Self, UnboundedReceiver<SessionEvent>)> {
        config.validate_strict()?;

        let mut roster = Roster::new(config.max_players);
        roster.admit(local_id, PALETTE[0], true)?;
        let mut engine = TurnEngine::new(config.turn_window, config.pending_turn_limit);
        engine.add_peer(local_id);

        Self::build(config.map_name, roster, engine, transport, local_id, true, None, None)
    }

    /// Create a joining session and send the join request to `host_id`.
    pub fn join(
        config: SessionConfig,
        transport: Arc<dyn Transport>,
        local_id: UserId,
        requested_colour: Colour,
        host_id: UserId,
    ) -> Result<(Self, UnboundedReceiver<SessionEvent>)> {
        config.validate_strict()?;

        let roster = Roster::new(config.max_players);
        let mut engine = TurnEngine::new(config.turn_window, config.pending_turn_limit);
        engine.add_peer(local_id);

        let mut joiner = Joiner::new(local_id, requested_colour);
        let request = joiner.request();

        let (session, events_rx) = Self::build(
            config.map_name,
            roster,
            engine,
            transport,
            local_id,
            false,
            Some(joiner),
            Some(host_id),
        )?;
        session
            .transport
            .send(host_id, request.into_frame().to_bytes())?;
        Ok((session, events_rx))
    }

    #[allow(clippy::too_many_arguments)]
    fn build(
        map_name: String,
        roster: Roster,
        engine: TurnEngine,
        transport: Arc<dyn Transport>,
        local_id: UserId,
        is_host: bool,
        joiner: Option<Joiner>,
        join_target: Option<UserId>,
    ) -> Result<(Self, UnboundedReceiver<SessionEvent>)> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let state = Arc::new(Mutex::new(State {
            map_name,
            roster,
            engine,
            joiner,
            join_target,
            pending_peer_joins: BTreeSet::new(),
        }));

        let mut dispatcher = PacketDispatcher::new();
        Self::register_handlers(
            &mut dispatcher,
            state.clone(),
            transport.clone(),
            events_tx.clone(),
            local_id,
            is_host,
        )?;

        Ok((
            Self {
                local_id,
                is_host,
                state,
                dispatcher,
                transport,
                events: events_tx,
            },
            events_rx,
        ))
    }

    fn register_handlers(
        dispatcher: &mut PacketDispatcher,
        state: SharedState,
        transport: Arc<dyn Transport>,
        events: UnboundedSender<SessionEvent>,
        local_id: UserId,
        is_host: bool,
    ) -> Result<()> {
        {
            let state = state.clone();
            let transport = transport.clone();
            let events = events.clone();
            dispatcher.register(ids::JOIN_REQUEST, move |from, mut buf| {
                let request = JoinRequestPacket::decode(&mut buf)?;
                let response = {
                    let mut st = lock(&state)?;
                    let map_name = st.map_name.clone();
                    let authority = if is_host {
                        Authority::Host
                    } else {
                        Authority::Peer
                    };
                    let response = handshake::respond_to_join(
                        &mut st.roster,
                        &map_name,
                        local_id,
                        authority,
                        &request,
                    )?;
                    st.engine.add_peer(request.user_id);
                    response
                };
                // Response goes out before the event so nothing broadcast by
                // the event's consumer can overtake the handshake.
                let granted = response.your_colour;
                transport.send(from, response.into_frame().to_bytes())?;
                let _ = events.send(SessionEvent::PeerJoined {
                    user: request.user_id,
                    colour: granted,
                });
                Ok(())
            })?;
        }

        {
            let state = state.clone();
            let transport = transport.clone();
            let events = events.clone();
            dispatcher.register(ids::JOIN_RESPONSE, move |from, mut buf| {
                let response = JoinResponsePacket::decode(&mut buf)?;
                let mut to_contact: Vec<(UserId, JoinRequestPacket)> = Vec::new();
                let mut joined: Vec<SessionEvent> = Vec::new();
                {
                    let mut st = lock(&state)?;
                    if st.join_target == Some(from) && st.joiner.is_some() {
                        // The answer to our own join. The target is treated
                        // as the host, so your_colour is binding.
                        let mut joiner = match st.joiner.take() {
                            Some(j) => j,
                            None => return Ok(()),
                        };
                        let outcome = joiner.complete(&response, true)?;
                        st.map_name = outcome.map_name.clone();
                        st.roster.admit(local_id, outcome.colour, false)?;
                        st.roster.admit(from, response.my_colour, true)?;
                        st.engine.add_peer(from);
                        joined.push(SessionEvent::PeerJoined {
                            user: from,
                            colour: response.my_colour,
                        });

                        // Pairwise handshakes with everyone else so the
                        // roster converges: they learn us, we learn their
                        // colours from their responses.
                        for user in outcome.other_users {
                            if user == from || user == local_id {
                                continue;
                            }
                            st.pending_peer_joins.insert(user);
                            to_contact.push((
                                user,
                                JoinRequestPacket {
                                    user_id: local_id,
                                    colour: outcome.colour,
                                },
                            ));
                        }
                    } else if st.pending_peer_joins.remove(&from) {
                        st.roster.admit(from, response.my_colour, false)?;
                        st.engine.add_peer(from);
                        joined.push(SessionEvent::PeerJoined {
                            user: from,
                            colour: response.my_colour,
                        });
                    } else {
                        debug!(from = %from, "unsolicited join response ignored");
                        return Ok(());
                    }
                }
                for event in joined {
                    let _ = events.send(event);
                }
                for (user, request) in to_contact {
                    transport.send(user, request.into_frame().to_bytes())?;
                }
                Ok(())
            })?;
        }

        {
            let events = events.clone();
            dispatcher.register(ids::CHAT, move |from, mut buf| {
                let chat = ChatPacket::decode(&mut buf)?;
                // Chat bypasses the turn barrier entirely.
                let _ = events.send(SessionEvent::Chat {
                    from,
                    text: chat.msg,
                });
                Ok(())
            })?;
        }

        {
            let state = state.clone();
            let events = events.clone();
            dispatcher.register(ids::START_GAME, move |from, mut buf| {
                StartGamePacket::decode(&mut buf)?;
                let outputs = {
                    let mut st = lock(&state)?;
                    st.engine.record_start(from)
                };
                emit(&events, outputs);
                Ok(())
            })?;
        }

        {
            let state = state;
            let events = events;
            dispatcher.register(ids::COMMAND, move |from, mut buf| {
                let packet = CommandPacket::decode(&mut buf)?;
                let outputs = {
                    let mut st = lock(&state)?;
                    match st.engine.record(from, packet.turn, packet.commands) {
                        Ok(outputs) => outputs,
                        Err(
                            e @ (ProtocolError::DuplicateSubmission { .. }
                            | ProtocolError::StaleSubmission { .. }),
                        ) => {
                            // Protocol anomaly: first submission stands.
                            warn!(error = %e, "command packet discarded");
                            return Ok(());
                        }
                        Err(e) => return Err(e),
                    }
                };
                emit(&events, outputs);
                Ok(())
            })?;
        }

        Ok(())
    }

    pub fn local_id(&self) -> UserId {
        self.local_id
    }

    pub fn is_host(&self) -> bool {
        self.is_host
    }

    /// The turn the local simulation should produce commands for next.
    pub fn current_turn(&self) -> Result<u32> {
        Ok(lock(&self.state)?.engine.current_turn())
    }

    /// Colours and ids of everyone currently joined (active peers only).
    pub fn roster_ids(&self) -> Result<Vec<UserId>> {
        Ok(lock(&self.state)?.roster.active_ids())
    }

    /// Declare the local peer ready; the match starts once every roster
    /// peer has done the same.
    ///
    /// # Errors
    /// [`ProtocolError::JoinIncomplete`] while the local join handshake is
    /// still in flight: the roster has not converged yet, so the start
    /// barrier would pass with only the local peer in it.
    pub fn mark_ready(&self) -> Result<()> {
        let outputs = {
            let mut st = lock(&self.state)?;
            if st.joiner.is_some() {
                return Err(ProtocolError::JoinIncomplete);
            }
            st.engine.record_start(self.local_id)
        };
        self.transport
            .broadcast(StartGamePacket.into_frame().to_bytes())?;
        emit(&self.events, outputs);
        Ok(())
    }

    /// Submit the local command set for the current turn and broadcast it.
    /// The packet bytes are built under the lock; the send happens after.
    pub fn submit_commands(&self, commands: Vec<RawCommand>) -> Result<()> {
        let (bytes, outputs) = {
            let mut st = lock(&self.state)?;
            if st.joiner.is_some() {
                return Err(ProtocolError::JoinIncomplete);
            }
            let turn = st.engine.current_turn();
            let outputs = st.engine.record(self.local_id, turn, commands.clone())?;
            let bytes = CommandPacket { turn, commands }.into_frame().to_bytes();
            (bytes, outputs)
        };
        self.transport.broadcast(bytes)?;
        emit(&self.events, outputs);
        Ok(())
    }

    /// Broadcast a chat line. Advisory; never required for correctness.
    pub fn send_chat(&self, text: &str) -> Result<()> {
        self.transport.broadcast(
            ChatPacket {
                msg: text.to_string(),
            }
            .into_frame()
            .to_bytes(),
        )
    }

    /// Feed one received frame's bytes into the protocol. Recoverable
    /// problems are logged and swallowed here so a bad frame never kills
    /// the receive loop.
    pub fn handle_frame(&self, from: UserId, bytes: &[u8]) {
        let result =
            Frame::from_bytes(bytes).and_then(|frame| self.dispatcher.dispatch(from, frame));
        match result {
            Ok(()) => {}
            Err(ProtocolError::UnknownType(id)) => {
                // A newer peer may send packet kinds we do not know.
                debug!(type_id = id, from = %from, "unknown packet type ignored");
            }
            Err(
                e @ (ProtocolError::MalformedFrame(_) | ProtocolError::TruncatedFrame { .. }),
            ) => {
                warn!(error = %e, from = %from, "frame dropped");
            }
            Err(e @ (ProtocolError::SessionFull { .. } | ProtocolError::ColourExhausted)) => {
                warn!(error = %e, from = %from, "join rejected");
            }
            Err(e) => {
                warn!(error = %e, from = %from, "protocol error");
            }
        }
    }

    /// React to a peer's transport connection closing.
    pub fn handle_disconnect(&self, from: UserId) {
        let outputs = match lock(&self.state) {
            Ok(mut st) => {
                if !st.roster.mark_departed(from) {
                    return;
                }
                st.engine.mark_departed(from)
            }
            Err(e) => {
                warn!(error = %e, "disconnect handling failed");
                return;
            }
        };
        // Departure is announced before any turn it unblocked.
        let _ = self.events.send(SessionEvent::PeerDeparted { user: from });
        emit(&self.events, outputs);
    }

    /// Drive the session from a transport event stream until it ends or the
    /// session aborts. Channel receivers adapt via
    /// `tokio_stream::wrappers::UnboundedReceiverStream`.
    pub async fn run<S>(&self, mut inbound: S)
    where
        S: Stream<Item = PeerEvent> + Unpin,
    {
        while let Some(event) = inbound.next().await {
            match event {
                PeerEvent::Frame { from, bytes } => self.handle_frame(from, &bytes),
                PeerEvent::Disconnected { from } => self.handle_disconnect(from),
            }
            let aborted = lock(&self.state).map(|st| st.engine.is_aborted());
            if matches!(aborted, Ok(true)) {
                debug!("session aborted, receive loop ending");
                break;
            }
        }
    }
}

fn emit(events: &UnboundedSender<SessionEvent>, outputs: Vec<EngineOutput>) {
    for output in outputs {
        let event = match output {
            EngineOutput::Started => SessionEvent::GameStarted,
            EngineOutput::TurnReady { turn, commands } => {
                SessionEvent::TurnReady { turn, commands }
            }
            EngineOutput::Aborted { reason } => SessionEvent::Aborted { reason },
        };
        let _ = events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::local::LocalHub;
    use tokio_stream::wrappers::UnboundedReceiverStream;

    fn config() -> SessionConfig {
        SessionConfig {
            map_name: "canyon".to_string(),
            ..SessionConfig::default()
        }
    }

    fn spawn_session(
        hub: &LocalHub,
        id: u32,
        host_of: Option<u32>,
    ) -> (
        Arc<Session>,
        UnboundedReceiver<SessionEvent>,
        Arc<crate::transport::local::LocalEndpoint>,
    ) {
        let (endpoint, inbox) = hub.attach(UserId(id)).unwrap();
        let endpoint = Arc::new(endpoint);
        let (session, events) = match host_of {
            None => Session::host(config(), endpoint.clone(), UserId(id)).unwrap(),
            Some(host_id) => Session::join(
                config(),
                endpoint.clone(),
                UserId(id),
                Colour::BLUE,
                UserId(host_id),
            )
            .unwrap(),
        };
        let session = Arc::new(session);
        let runner = session.clone();
        tokio::spawn(async move { runner.run(UnboundedReceiverStream::new(inbox)).await });
        (session, events, endpoint)
    }

    #[tokio::test]
    async fn run_loop_drives_a_two_peer_match() {
        let hub = LocalHub::new();
        let (a, mut events_a, _ea) = spawn_session(&hub, 1, None);
        let (b, mut events_b, _eb) = spawn_session(&hub, 2, Some(1));

        assert_eq!(
            events_a.recv().await,
            Some(SessionEvent::PeerJoined {
                user: UserId(2),
                colour: Colour::BLUE,
            })
        );
        assert_eq!(
            events_b.recv().await,
            Some(SessionEvent::PeerJoined {
                user: UserId(1),
                colour: PALETTE[0],
            })
        );

        a.mark_ready().unwrap();
        b.mark_ready().unwrap();
        assert_eq!(events_a.recv().await, Some(SessionEvent::GameStarted));
        assert_eq!(events_b.recv().await, Some(SessionEvent::GameStarted));

        a.submit_commands(Vec::new()).unwrap();
        b.submit_commands(Vec::new()).unwrap();
        let expected = SessionEvent::TurnReady {
            turn: 0,
            commands: vec![],
        };
        assert_eq!(events_a.recv().await, Some(expected.clone()));
        assert_eq!(events_b.recv().await, Some(expected));
    }

    #[tokio::test]
    async fn run_loop_surfaces_departure() {
        let hub = LocalHub::new();
        let (_a, mut events_a, _ea) = spawn_session(&hub, 1, None);
        let (_b, mut events_b, eb) = spawn_session(&hub, 2, Some(1));

        assert!(matches!(
            events_a.recv().await,
            Some(SessionEvent::PeerJoined { user: UserId(2), .. })
        ));
        assert!(matches!(
            events_b.recv().await,
            Some(SessionEvent::PeerJoined { user: UserId(1), .. })
        ));

        eb.disconnect();
        assert_eq!(
            events_a.recv().await,
            Some(SessionEvent::PeerDeparted { user: UserId(2) })
        );
    }
}
