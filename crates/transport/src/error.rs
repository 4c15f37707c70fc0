// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transport-level errors.

use finj_core::Peer;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("protocol error: {0}")]
    Protocol(#[from] finj_wire::ProtocolError),
    #[error("peer {0} is not registered")]
    UnknownPeer(Peer),
    #[error("peer {0} is not yet connected")]
    NotConnected(Peer),
}
