// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared error type for the harness's core domain operations.

use std::fmt;

/// Domain-level errors that cross crate boundaries without needing a
/// dedicated enum of their own.
#[derive(Debug)]
pub enum CoreError {
    MalformedTask(String),
    InvalidPeerAddr(String),
    ConfigUnreadable(String),
    Other(String),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::MalformedTask(detail) => write!(f, "malformed task entry: {detail}"),
            CoreError::InvalidPeerAddr(addr) => write!(f, "invalid peer address: {addr}"),
            CoreError::ConfigUnreadable(path) => write!(f, "configuration file unreadable: {path}"),
            CoreError::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for CoreError {}
