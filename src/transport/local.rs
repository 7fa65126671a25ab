//! In-memory transport: a hub of in-process peers connected by channels.
//!
//! This is the reference [`Transport`] implementation and what the
//! integration tests run sessions over. Each attached endpoint gets an inbox
//! receiver; sending enqueues a [`PeerEvent::Frame`] on the target's inbox,
//! and dropping an endpoint (or calling `disconnect`) delivers
//! [`PeerEvent::Disconnected`] to everyone still attached.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;

use crate::error::{ProtocolError, Result};
use crate::session::roster::UserId;
use crate::transport::{PeerEvent, Transport};

type Inboxes = Arc<Mutex<HashMap<UserId, UnboundedSender<PeerEvent>>>>;

/// Connects any number of in-process endpoints.
#[derive(Clone, Default)]
pub struct LocalHub {
    inboxes: Inboxes,
}

impl LocalHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a peer, returning its outbound endpoint and inbox.
    pub fn attach(&self, id: UserId) -> Result<(LocalEndpoint, UnboundedReceiver<PeerEvent>)> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inboxes
            .lock()
            .map_err(|_| ProtocolError::TransportError("local hub lock poisoned".to_string()))?
            .insert(id, tx);
        debug!(peer = %id, "endpoint attached");
        Ok((
            LocalEndpoint {
                id,
                inboxes: self.inboxes.clone(),
            },
            rx,
        ))
    }
}

/// One peer's handle onto the hub.
pub struct LocalEndpoint {
    id: UserId,
    inboxes: Inboxes,
}

impl LocalEndpoint {
    /// Close this endpoint: everyone else sees a disconnect event.
    pub fn disconnect(&self) {
        let mut inboxes = match self.inboxes.lock() {
            Ok(guard) => guard,
            Err(_) => return,
        };
        inboxes.remove(&self.id);
        for (peer, tx) in inboxes.iter() {
            let _ = tx.send(PeerEvent::Disconnected { from: self.id });
            debug!(from = %self.id, to = %peer, "disconnect delivered");
        }
    }
}

impl Transport for LocalEndpoint {
    fn send(&self, to: UserId, bytes: Bytes) -> Result<()> {
        let inboxes = self
            .inboxes
            .lock()
            .map_err(|_| ProtocolError::TransportError("local hub lock poisoned".to_string()))?;
        let tx = inboxes.get(&to).ok_or(ProtocolError::ConnectionClosed)?;
        tx.send(PeerEvent::Frame {
            from: self.id,
            bytes,
        })
        .map_err(|_| ProtocolError::ConnectionClosed)
    }

    fn broadcast(&self, bytes: Bytes) -> Result<()> {
        let inboxes = self
            .inboxes
            .lock()
            .map_err(|_| ProtocolError::TransportError("local hub lock poisoned".to_string()))?;
        for (peer, tx) in inboxes.iter() {
            if *peer == self.id {
                continue;
            }
            let _ = tx.send(PeerEvent::Frame {
                from: self.id,
                bytes: bytes.clone(),
            });
        }
        Ok(())
    }
}
