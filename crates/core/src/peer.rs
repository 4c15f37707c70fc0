// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Peer addressing: `ip:port` pairs identifying a transport endpoint.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// The address of a peer in the transport's peer registry.
///
/// Kept as a plain (host, port) pair rather than a `SocketAddr` because the
/// wire protocol and the CSV execution logs both want the literal
/// `ip:port` string form, and a `Peer` must be usable as a stable map key
/// across reconnects where the underlying `SocketAddr` resolution may vary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Peer {
    pub host: String,
    pub port: u16,
}

impl Peer {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port }
    }
}

impl From<SocketAddr> for Peer {
    fn from(addr: SocketAddr) -> Self {
        Peer::new(addr.ip().to_string(), addr.port())
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for Peer {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').map(str::trim).collect();
        if parts.len() != 2 {
            return Err(CoreError::InvalidPeerAddr(s.to_string()));
        }
        let port: u16 = parts[1]
            .parse()
            .map_err(|_| CoreError::InvalidPeerAddr(s.to_string()))?;
        Ok(Peer::new(parts[0], port))
    }
}

/// Parses a comma-separated `ip:port,ip:port` list, as accepted by the
/// controller's `-a` flag.
pub fn parse_peer_list(s: &str) -> Result<Vec<Peer>, CoreError> {
    s.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(Peer::from_str)
        .collect()
}
