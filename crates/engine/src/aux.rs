// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Auxiliary sidecar subprocesses: long-lived processes (e.g. a
//! monitoring agent) started alongside the server and worker pool and
//! torn down on engine shutdown, independent of task execution.

use tokio::process::{Child, Command};

/// Spawns and later tears down the `AUX_COMMANDS` sidecar processes.
/// Commands that fail to start are logged and skipped, matching the
/// original tool's best-effort `SubprocessManager`.
pub struct AuxProcessManager {
    children: Vec<Child>,
}

impl AuxProcessManager {
    /// Splits and spawns every command in `commands`. Invalid quoting or
    /// an unspawnable binary just drops that one entry.
    pub fn start(commands: &[String]) -> Self {
        let mut children = Vec::new();
        for command in commands {
            let Some(argv) = shlex::split(command) else {
                tracing::warn!(command, "could not parse auxiliary command, skipping");
                continue;
            };
            if argv.is_empty() {
                continue;
            }
            match Command::new(&argv[0]).args(&argv[1..]).spawn() {
                Ok(child) => children.push(child),
                Err(err) => tracing::warn!(command, error = %err, "could not start auxiliary command"),
            }
        }
        Self { children }
    }

    /// Terminates every auxiliary subprocess, waiting for each to exit.
    ///
    /// The original tool sends SIGTERM before waiting; `forbid(unsafe_code)`
    /// rules out an unsafe `libc::kill` call here, so we use tokio's
    /// portable forceful kill instead (see DESIGN.md).
    pub async fn stop(&mut self) {
        for child in &mut self.children {
            let _ = child.start_kill();
            let _ = child.wait().await;
        }
        self.children.clear();
    }
}

#[cfg(test)]
#[path = "aux_tests.rs"]
mod tests;
