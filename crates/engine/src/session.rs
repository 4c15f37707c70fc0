// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session master-election state machine: tracks which connected peer (if
//! any) is the controller currently driving an injection session, and
//! decides how `command_session_s`/`command_session_e` requests should be
//! acknowledged.

use finj_core::Peer;
use parking_lot::Mutex;

struct SessionState {
    master: Option<Peer>,
    session_timestamp: i64,
}

/// The outcome of processing a session start/end request: what ack to
/// send back, and whether the worker pool must be force-restarted before
/// accepting new tasks under the (possibly new) master.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionUpdate {
    pub ack_positive: bool,
    /// `Some(-1)` signals "accepted, but the pool was reset" per the
    /// original's overloaded ack error field (see DESIGN.md Open Question
    /// #3). Always `None` on a rejection or a plain resumed session.
    pub ack_error: Option<i32>,
    pub pool_restart: bool,
}

/// Tracks session master election for one engine process. There is at
/// most one active master at a time; any other connected peer may only
/// observe (greet, pull-mode status), never drive task execution.
pub struct SessionManager {
    state: Mutex<SessionState>,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionManager {
    pub fn new() -> Self {
        Self { state: Mutex::new(SessionState { master: None, session_timestamp: -1 }) }
    }

    pub fn master(&self) -> Option<Peer> {
        self.state.lock().master.clone()
    }

    pub fn session_active(&self) -> bool {
        self.state.lock().master.is_some()
    }

    pub fn is_master(&self, from: &Peer) -> bool {
        self.state.lock().master.as_ref() == Some(from)
    }

    /// Handles a `command_session_e` (end-session) request. Only the
    /// current master may end its own session; anyone else is rejected.
    pub fn end_session(&self, from: &Peer) -> SessionUpdate {
        let mut state = self.state.lock();
        if state.master.as_ref() == Some(from) {
            state.master = None;
            state.session_timestamp = -1;
            SessionUpdate { ack_positive: true, ack_error: None, pool_restart: false }
        } else {
            SessionUpdate { ack_positive: false, ack_error: None, pool_restart: false }
        }
    }

    /// Handles a `command_session_s` (start-session) request. Accepted
    /// when there is no current master, the current master has dropped
    /// its connection, or the request comes from the current master
    /// itself (a reconnect). A brand-new session (different timestamp, or
    /// replay disabled, or no prior master) forces a pool restart so
    /// orphaned tasks from a previous master can't keep running.
    pub fn start_session(&self, from: &Peer, session_ts: i64, registered_hosts: &[Peer], replay_enabled: bool) -> SessionUpdate {
        let mut state = self.state.lock();
        let master_still_registered = state.master.as_ref().is_some_and(|m| registered_hosts.contains(m));
        let accept = state.master.is_none() || !master_still_registered || state.master.as_ref() == Some(from);
        if !accept {
            return SessionUpdate { ack_positive: false, ack_error: None, pool_restart: false };
        }
        let needs_restart = !replay_enabled || state.session_timestamp != session_ts || state.master.is_none();
        state.master = Some(from.clone());
        state.session_timestamp = session_ts;
        SessionUpdate { ack_positive: true, ack_error: if needs_restart { Some(-1) } else { None }, pool_restart: needs_restart }
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
