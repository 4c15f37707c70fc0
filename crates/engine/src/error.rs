// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Errors specific to running the engine role.

use finj_core::Peer;
use finj_transport::TransportError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("could not bind listening port {0}: {1}")]
    Bind(u16, std::io::Error),
    #[error("task {0} could not be spawned: {1}")]
    Spawn(String, std::io::Error),
    #[error("unexpected message from non-master host {0}")]
    NotMaster(Peer),
}
