//! Shared harness for integration tests: sessions wired over a [`LocalHub`],
//! pumped synchronously so every test is deterministic.

#![allow(dead_code)]

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;

use lockstep_protocol::{
    Colour, LocalEndpoint, LocalHub, PeerEvent, Session, SessionConfig, SessionEvent, UserId,
};

pub struct TestPeer {
    pub session: Session,
    pub endpoint: Arc<LocalEndpoint>,
    pub inbox: UnboundedReceiver<PeerEvent>,
    pub events: UnboundedReceiver<SessionEvent>,
}

pub fn config() -> SessionConfig {
    SessionConfig {
        map_name: "canyon".to_string(),
        ..SessionConfig::default()
    }
}

pub fn host_with_config(hub: &LocalHub, id: u32, config: SessionConfig) -> TestPeer {
    let (endpoint, inbox) = hub.attach(UserId(id)).unwrap();
    let endpoint = Arc::new(endpoint);
    let (session, events) = Session::host(config, endpoint.clone(), UserId(id)).unwrap();
    TestPeer {
        session,
        endpoint,
        inbox,
        events,
    }
}

pub fn host(hub: &LocalHub, id: u32) -> TestPeer {
    host_with_config(hub, id, config())
}

pub fn join_with_config(
    hub: &LocalHub,
    id: u32,
    colour: Colour,
    host_id: u32,
    config: SessionConfig,
) -> TestPeer {
    let (endpoint, inbox) = hub.attach(UserId(id)).unwrap();
    let endpoint = Arc::new(endpoint);
    let (session, events) =
        Session::join(config, endpoint.clone(), UserId(id), colour, UserId(host_id)).unwrap();
    TestPeer {
        session,
        endpoint,
        inbox,
        events,
    }
}

pub fn join(hub: &LocalHub, id: u32, colour: Colour, host_id: u32) -> TestPeer {
    join_with_config(hub, id, colour, host_id, config())
}

/// Deliver queued transport events to every session until nothing moves.
pub fn pump(peers: &mut [TestPeer]) {
    loop {
        let mut progressed = false;
        for peer in peers.iter_mut() {
            while let Ok(event) = peer.inbox.try_recv() {
                progressed = true;
                match event {
                    PeerEvent::Frame { from, bytes } => peer.session.handle_frame(from, &bytes),
                    PeerEvent::Disconnected { from } => peer.session.handle_disconnect(from),
                }
            }
        }
        if !progressed {
            break;
        }
    }
}

pub fn drain(peer: &mut TestPeer) -> Vec<SessionEvent> {
    let mut out = Vec::new();
    while let Ok(event) = peer.events.try_recv() {
        out.push(event);
    }
    out
}
