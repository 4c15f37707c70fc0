// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("transport error: {0}")]
    Transport(#[from] finj_transport::TransportError),
    #[error("storage error: {0}")]
    Storage(#[from] finj_storage::StorageError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("workload file is empty")]
    EmptyWorkload,
    #[error("invalid peer address: {0}")]
    InvalidPeer(#[from] finj_core::CoreError),
}
