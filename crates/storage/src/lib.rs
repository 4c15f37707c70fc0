// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workload CSV I/O, execution-log writing, and result-file naming for
//! the fault-injection harness.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod csv_format;
pub mod error;
pub mod execlog;
pub mod paths;
pub mod workload;

pub use error::StorageError;
pub use execlog::ExecutionLogWriter;
pub use workload::{WorkloadReader, WorkloadWriter};
