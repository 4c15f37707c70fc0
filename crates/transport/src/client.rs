// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `Client`: the controller side of the transport. Dials one or more
//! engines, reconnects to "dangling" peers that dropped their connection
//! within a retry window, and requests replay of anything missed while
//! disconnected.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use finj_core::{Clock, Peer};
use finj_wire::{read_frame, Frame, Message};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::entity::{InboundEvent, PeerConn, PeerRegistry};
use crate::error::TransportError;
use crate::history::MessageHistory;
use crate::seq::SeqCounter;

#[derive(Debug, Clone, Copy)]
struct DanglingState {
    first_lost_ms: u64,
    last_attempt_ms: u64,
    /// The client's own `(sessionTs,seqNum)` high-water mark at the
    /// moment this peer went dangling, so a successful reconnect knows
    /// which buffered broadcasts to forward.
    last_sent: (u32, u32),
}

/// Reconnecting client transport. One `Client` can be connected to many
/// engines at once; each peer's connection is independent.
pub struct Client<C: Clock> {
    registry: Arc<PeerRegistry>,
    clock: C,
    seq: Mutex<SeqCounter>,
    /// Buffered broadcasts, kept so a reconnecting peer can be caught up
    /// without waiting on a request from the other side.
    history: Mutex<MessageHistory>,
    replay_enabled: bool,
    dangling: Mutex<HashMap<Peer, DanglingState>>,
    last_seen_seq: Mutex<HashMap<Peer, (u32, u32)>>,
    /// The most recent `(sessionTs,seqNum)` this client has assigned to
    /// any outbound frame, used to stamp `DanglingState::last_sent`.
    last_issued: Mutex<(u32, u32)>,
    retry_interval_ms: u64,
    retry_period_ms: u64,
    inbound_tx: mpsc::UnboundedSender<InboundEvent>,
    cancel: CancellationToken,
}

impl<C: Clock + 'static> Client<C> {
    pub fn new(
        clock: C,
        session_ts: u32,
        retry_interval_secs: u32,
        retry_period_secs: u32,
        replay_enabled: bool,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<InboundEvent>) {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let client = Arc::new(Self {
            registry: Arc::new(PeerRegistry::new()),
            clock,
            seq: Mutex::new(SeqCounter::new(session_ts)),
            history: Mutex::new(MessageHistory::new()),
            replay_enabled,
            dangling: Mutex::new(HashMap::new()),
            last_seen_seq: Mutex::new(HashMap::new()),
            last_issued: Mutex::new((session_ts, 0)),
            retry_interval_ms: u64::from(retry_interval_secs) * 1000,
            retry_period_ms: u64::from(retry_period_secs) * 1000,
            inbound_tx,
            cancel: CancellationToken::new(),
        });
        client.clone().spawn_dangling_retry_task();
        (client, inbound_rx)
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn registry(&self) -> &PeerRegistry {
        &self.registry
    }

    /// Connects to `peer`, registering it and spawning its reader task on
    /// success. A failed connection is logged and swallowed, matching the
    /// original tool's best-effort `add_servers`.
    pub async fn connect(self: &Arc<Self>, peer: Peer) {
        match TcpStream::connect((peer.host.as_str(), peer.port)).await {
            Ok(stream) => {
                self.register_stream(peer.clone(), stream);
                tracing::info!(%peer, "connected to server");
            }
            Err(err) => {
                tracing::warn!(%peer, error = %err, "could not connect to server");
            }
        }
    }

    pub async fn connect_all(self: &Arc<Self>, peers: &[Peer]) {
        for peer in peers {
            self.connect(peer.clone()).await;
        }
    }

    fn register_stream(self: &Arc<Self>, peer: Peer, stream: TcpStream) {
        let _ = stream.set_nodelay(true);
        let (read_half, write_half) = stream.into_split();
        self.registry.register(peer.clone(), Arc::new(PeerConn::new(write_half)));
        self.last_seen_seq.lock().remove(&peer);
        self.spawn_reader(peer, read_half);
    }

    fn spawn_reader(self: &Arc<Self>, peer: Peer, mut read_half: tokio::net::tcp::OwnedReadHalf) {
        let this = self.clone();
        tokio::spawn(async move {
            loop {
                match read_frame(&mut read_half).await {
                    Ok(Some(Frame::Message { session_ts, seq_num, message })) => {
                        if this.is_duplicate(&peer, session_ts, seq_num) {
                            continue;
                        }
                        let _ = this.inbound_tx.send(InboundEvent::Message { peer: peer.clone(), session_ts, seq_num, message });
                    }
                    Ok(Some(Frame::ReplayRequest { .. })) => {
                        tracing::warn!(%peer, "client received an unexpected replay request");
                    }
                    Ok(None) => {
                        this.on_connection_lost(&peer);
                        break;
                    }
                    Err(err) => {
                        tracing::warn!(%peer, error = %err, "read error, treating connection as lost");
                        this.on_connection_lost(&peer);
                        break;
                    }
                }
            }
        });
    }

    /// Client-driven sequence-number dedup: a message is a duplicate only
    /// if its seq_num is not newer than the last one seen for that peer's
    /// current session. The server itself performs no such tracking (see
    /// DESIGN.md's Open Question #2 resolution).
    fn is_duplicate(&self, peer: &Peer, session_ts: u32, seq_num: u32) -> bool {
        let mut seen = self.last_seen_seq.lock();
        match seen.get(peer) {
            Some(&(last_ts, last_seq)) if last_ts == session_ts && seq_num <= last_seq => true,
            _ => {
                seen.insert(peer.clone(), (session_ts, seq_num));
                false
            }
        }
    }

    fn on_connection_lost(&self, peer: &Peer) {
        self.registry.remove(peer);
        let _ = self.inbound_tx.send(InboundEvent::ConnectionLost { peer: peer.clone() });
        let now = self.clock.epoch_ms();
        let last_sent = *self.last_issued.lock();
        self.dangling.lock().entry(peer.clone()).or_insert(DanglingState {
            first_lost_ms: now,
            last_attempt_ms: now.saturating_sub(self.retry_period_ms),
            last_sent,
        });
    }

    fn spawn_dangling_retry_task(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(1));
            loop {
                tokio::select! {
                    _ = self.cancel.cancelled() => break,
                    _ = ticker.tick() => self.restore_dangling_connections().await,
                }
            }
        });
    }

    async fn restore_dangling_connections(self: &Arc<Self>) {
        let now = self.clock.epoch_ms();
        let candidates: Vec<Peer> = {
            let dangling = self.dangling.lock();
            dangling
                .iter()
                .filter(|(_, state)| now.saturating_sub(state.last_attempt_ms) >= self.retry_period_ms)
                .map(|(peer, _)| peer.clone())
                .collect()
        };
        for peer in candidates {
            let expired = {
                let mut dangling = self.dangling.lock();
                if let Some(state) = dangling.get_mut(&peer) {
                    state.last_attempt_ms = now;
                    now.saturating_sub(state.first_lost_ms) > self.retry_interval_ms
                } else {
                    true
                }
            };
            if expired {
                self.dangling.lock().remove(&peer);
                tracing::info!(%peer, "giving up on dangling connection after retry interval");
                continue;
            }
            match TcpStream::connect((peer.host.as_str(), peer.port)).await {
                Ok(stream) => {
                    let last_sent = self.dangling.lock().remove(&peer).map(|s| s.last_sent);
                    let last_recv = self.last_seen_seq.lock().get(&peer).copied();
                    self.register_stream(peer.clone(), stream);
                    if self.replay_enabled {
                        self.forward_missed_broadcasts(&peer, last_sent).await;
                        let (recv_ts, recv_seq) = last_recv.unwrap_or((0, 0));
                        let _ = self.request_replay(&peer, recv_ts, recv_seq).await;
                    }
                    let _ = self.inbound_tx.send(InboundEvent::ConnectionRestored { peer: peer.clone() });
                    tracing::info!(%peer, "connection to server was successfully restored");
                }
                Err(_) => { /* still unreachable, retry again next period */ }
            }
        }
    }

    /// Resends every broadcast this client has buffered since `since`
    /// (the peer's high-water mark when it went dangling), preserving
    /// the original `(sessionTs,seqNum)` rather than re-stamping through
    /// the live counter.
    async fn forward_missed_broadcasts(&self, peer: &Peer, since: Option<(u32, u32)>) {
        let Some((session_ts, seq_num)) = since else { return };
        let entries = self.history.lock().replay_from(session_ts, seq_num);
        for (seq_num, message) in entries {
            if let Err(err) = self.registry.send_to(peer, &Frame::message(session_ts, seq_num, message)).await {
                tracing::warn!(%peer, error = %err, "failed to forward buffered broadcast on reconnect");
                break;
            }
        }
    }

    pub async fn send(&self, peer: &Peer, message: Message) -> Result<(), TransportError> {
        let (session_ts, seq_num) = self.seq.lock().next(&self.clock);
        *self.last_issued.lock() = (session_ts, seq_num);
        if self.replay_enabled {
            self.history.lock().push(session_ts, seq_num, Some(peer.clone()), message.clone());
        }
        self.registry.send_to(peer, &Frame::message(session_ts, seq_num, message)).await
    }

    pub async fn broadcast(&self, message: Message) {
        let (session_ts, seq_num) = self.seq.lock().next(&self.clock);
        *self.last_issued.lock() = (session_ts, seq_num);
        if self.replay_enabled {
            self.history.lock().push(session_ts, seq_num, None, message.clone());
        }
        self.registry.broadcast(&Frame::message(session_ts, seq_num, message)).await;
    }

    /// Asks `peer` to resend anything buffered for `session_ts` after
    /// `from_seq_num`, used right after a reconnect when
    /// `RECOVER_AFTER_DISCONNECT` is enabled.
    pub async fn request_replay(&self, peer: &Peer, session_ts: u32, from_seq_num: u32) -> Result<(), TransportError> {
        self.registry.send_to(peer, &Frame::replay_request(session_ts, from_seq_num)).await
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
