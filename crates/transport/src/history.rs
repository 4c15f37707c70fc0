// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded replay history: the server keeps the last `MAX_HISTORY`
//! outbound messages so that a reconnecting client can ask to replay
//! everything it missed from a given sequence number onward.

use std::collections::VecDeque;

use finj_core::Peer;
use finj_wire::Message;

/// The replay buffer bound.
pub const MAX_HISTORY: usize = 4096;

#[derive(Debug, Clone)]
struct Entry {
    session_ts: u32,
    seq_num: u32,
    /// `None` for a broadcast; `Some(peer)` for a unicast send. Replay
    /// only ever resends broadcasts, since a unicast reply (an ack, a
    /// greet reply) was never meant for whoever else asks to replay.
    target: Option<Peer>,
    message: Message,
}

#[derive(Debug, Default)]
pub struct MessageHistory {
    entries: VecDeque<Entry>,
}

impl MessageHistory {
    pub fn new() -> Self {
        Self { entries: VecDeque::with_capacity(MAX_HISTORY) }
    }

    /// Records a sent message, evicting the oldest entry once the ring is
    /// full. `target` is `None` for a broadcast, `Some(peer)` for a
    /// unicast send.
    pub fn push(&mut self, session_ts: u32, seq_num: u32, target: Option<Peer>, message: Message) {
        if self.entries.len() == MAX_HISTORY {
            self.entries.pop_front();
        }
        self.entries.push_back(Entry { session_ts, seq_num, target, message });
    }

    /// Returns every buffered *broadcast* message for `session_ts` with a
    /// sequence number strictly greater than `from_seq_num`, in send
    /// order. Unicast entries are never replayed.
    pub fn replay_from(&self, session_ts: u32, from_seq_num: u32) -> Vec<(u32, Message)> {
        self.entries
            .iter()
            .filter(|e| e.session_ts == session_ts && e.seq_num > from_seq_num && e.target.is_none())
            .map(|e| (e.seq_num, e.message.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[path = "history_tests.rs"]
mod tests;
