// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared connection bookkeeping used by both [`crate::client::Client`] and
//! [`crate::server::Server`]: a registry of live peer write-halves, and the
//! inbound-event shape fed back to whichever component owns the event
//! loop.

use std::collections::HashMap;
use std::sync::Arc;

use finj_core::Peer;
use finj_wire::{write_frame, Frame, Message, ProtocolError};
use parking_lot::RwLock;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex as AsyncMutex;

use crate::error::TransportError;

/// A registered peer's write half, serialized behind a lock so concurrent
/// senders (the injection loop and a clock-correction broadcast, say)
/// never interleave partial frames.
pub struct PeerConn {
    writer: AsyncMutex<OwnedWriteHalf>,
}

impl PeerConn {
    pub fn new(writer: OwnedWriteHalf) -> Self {
        Self { writer: AsyncMutex::new(writer) }
    }

    pub async fn send(&self, frame: &Frame) -> Result<(), ProtocolError> {
        let mut w = self.writer.lock().await;
        write_frame(&mut *w, frame).await
    }
}

/// The live peer table shared between the reader tasks and whatever code
/// wants to send or broadcast.
#[derive(Default)]
pub struct PeerRegistry {
    conns: RwLock<HashMap<Peer, Arc<PeerConn>>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, peer: Peer, conn: Arc<PeerConn>) {
        self.conns.write().insert(peer, conn);
    }

    pub fn remove(&self, peer: &Peer) -> Option<Arc<PeerConn>> {
        self.conns.write().remove(peer)
    }

    pub fn get(&self, peer: &Peer) -> Option<Arc<PeerConn>> {
        self.conns.read().get(peer).cloned()
    }

    pub fn contains(&self, peer: &Peer) -> bool {
        self.conns.read().contains_key(peer)
    }

    pub fn peers(&self) -> Vec<Peer> {
        self.conns.read().keys().cloned().collect()
    }

    pub async fn send_to(&self, peer: &Peer, frame: &Frame) -> Result<(), TransportError> {
        let conn = self.get(peer).ok_or_else(|| TransportError::NotConnected(peer.clone()))?;
        conn.send(frame).await.map_err(TransportError::from)
    }

    pub async fn broadcast(&self, frame: &Frame) {
        for peer in self.peers() {
            if let Err(err) = self.send_to(&peer, frame).await {
                tracing::warn!(%peer, error = %err, "broadcast send failed");
            }
        }
    }
}

/// A decoded inbound happening that the owning component's event loop
/// reacts to: a message from a peer, or a synthesized connection-state
/// change (the original tool injects these as sentinel values into the
/// same queue real messages arrive on).
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    Message { peer: Peer, session_ts: u32, seq_num: u32, message: Message },
    ConnectionLost { peer: Peer },
    ConnectionRestored { peer: Peer },
    ConnectionFinalized { peer: Peer },
}
