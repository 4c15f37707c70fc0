// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire protocol for controller/engine communication.
//!
//! Wire format: 4-byte big-endian length prefix, 4-byte session
//! timestamp, 4-byte sequence number, JSON payload (empty payload = a
//! forwarding/replay request).

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod frame;
mod message;

pub use frame::{read_frame, write_frame, Frame, ProtocolError};
pub use message::{Message, TaskFields};
