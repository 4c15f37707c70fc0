// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `Server`: the engine side of the transport. Accepts connections from
//! any number of peers, and — when replay is enabled — keeps a bounded
//! history of everything it has sent so a reconnecting peer can ask to
//! have it resent.

use std::sync::Arc;

use finj_core::{Clock, Peer};
use finj_wire::{read_frame, Frame, Message};
use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::entity::{InboundEvent, PeerConn, PeerRegistry};
use crate::error::TransportError;
use crate::history::MessageHistory;
use crate::seq::SeqCounter;

pub struct Server<C: Clock> {
    registry: Arc<PeerRegistry>,
    clock: C,
    seq: Mutex<SeqCounter>,
    history: Mutex<MessageHistory>,
    replay_enabled: bool,
    inbound_tx: mpsc::UnboundedSender<InboundEvent>,
    cancel: CancellationToken,
    port: u16,
}

impl<C: Clock + 'static> Server<C> {
    /// Binds `port` and starts accepting connections in the background.
    /// `replay_enabled` corresponds to the `RECOVER_AFTER_DISCONNECT`
    /// config key: when true, the server remembers sent messages and
    /// serves replay requests against them.
    pub async fn bind(
        clock: C,
        session_ts: u32,
        port: u16,
        replay_enabled: bool,
    ) -> Result<(Arc<Self>, mpsc::UnboundedReceiver<InboundEvent>), TransportError> {
        let listener = TcpListener::bind(("0.0.0.0", port)).await?;
        let bound_port = listener.local_addr()?.port();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let server = Arc::new(Self {
            registry: Arc::new(PeerRegistry::new()),
            clock,
            seq: Mutex::new(SeqCounter::new(session_ts)),
            history: Mutex::new(MessageHistory::new()),
            replay_enabled,
            inbound_tx,
            cancel: CancellationToken::new(),
            port: bound_port,
        });
        server.clone().spawn_accept_loop(listener);
        Ok((server, inbound_rx))
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn registry(&self) -> &PeerRegistry {
        &self.registry
    }

    fn spawn_accept_loop(self: Arc<Self>, listener: TcpListener) {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = self.cancel.cancelled() => break,
                    accepted = listener.accept() => {
                        match accepted {
                            Ok((stream, addr)) => self.accept_connection(stream, addr.into()),
                            Err(err) => tracing::warn!(error = %err, "accept failed"),
                        }
                    }
                }
            }
        });
    }

    fn accept_connection(self: &Arc<Self>, stream: TcpStream, peer: Peer) {
        let _ = stream.set_nodelay(true);
        let (read_half, write_half) = stream.into_split();
        self.registry.register(peer.clone(), Arc::new(PeerConn::new(write_half)));
        tracing::info!(%peer, "accepted connection");
        let this = self.clone();
        tokio::spawn(async move {
            let mut read_half = read_half;
            loop {
                match read_frame(&mut read_half).await {
                    Ok(Some(Frame::Message { session_ts, seq_num, message })) => {
                        let _ = this.inbound_tx.send(InboundEvent::Message { peer: peer.clone(), session_ts, seq_num, message });
                    }
                    Ok(Some(Frame::ReplayRequest { session_ts, seq_num })) => {
                        this.serve_replay(&peer, session_ts, seq_num).await;
                    }
                    Ok(None) => {
                        this.registry.remove(&peer);
                        let _ = this.inbound_tx.send(InboundEvent::ConnectionLost { peer: peer.clone() });
                        break;
                    }
                    Err(err) => {
                        tracing::warn!(%peer, error = %err, "read error, dropping peer");
                        this.registry.remove(&peer);
                        let _ = this.inbound_tx.send(InboundEvent::ConnectionLost { peer: peer.clone() });
                        break;
                    }
                }
            }
        });
    }

    async fn serve_replay(&self, peer: &Peer, session_ts: u32, from_seq_num: u32) {
        if !self.replay_enabled {
            return;
        }
        let entries = self.history.lock().replay_from(session_ts, from_seq_num);
        for (seq_num, message) in entries {
            if let Err(err) = self.registry.send_to(peer, &Frame::message(session_ts, seq_num, message)).await {
                tracing::warn!(%peer, error = %err, "failed to replay buffered message");
                break;
            }
        }
    }

    pub async fn send(&self, peer: &Peer, message: Message) -> Result<(), TransportError> {
        let (session_ts, seq_num) = self.seq.lock().next(&self.clock);
        if self.replay_enabled {
            self.history.lock().push(session_ts, seq_num, Some(peer.clone()), message.clone());
        }
        self.registry.send_to(peer, &Frame::message(session_ts, seq_num, message)).await
    }

    pub async fn broadcast(&self, message: Message) {
        let (session_ts, seq_num) = self.seq.lock().next(&self.clock);
        if self.replay_enabled {
            self.history.lock().push(session_ts, seq_num, None, message.clone());
        }
        self.registry.broadcast(&Frame::message(session_ts, seq_num, message)).await;
    }

    pub fn registered_peers(&self) -> Vec<Peer> {
        self.registry.peers()
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
