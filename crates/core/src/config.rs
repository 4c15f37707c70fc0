// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Harness configuration: the key/value table shared by the engine and
//! controller binaries, loadable from an optional JSON or TOML file with
//! hard-coded defaults for anything the file omits.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

fn default_results_dir() -> String {
    "results".to_string()
}
fn default_true() -> bool {
    true
}
fn default_server_port() -> u16 {
    30000
}
fn default_max_requests() -> u32 {
    20
}
fn default_retry_interval() -> u32 {
    600
}
fn default_retry_period() -> u32 {
    30
}
fn default_pre_send_interval() -> u32 {
    600
}
fn default_workload_padding() -> u32 {
    20
}
fn default_session_wait() -> u32 {
    30
}
fn default_socket_timeout() -> u32 {
    10
}
fn default_max_connections() -> u32 {
    100
}

/// Harness-wide configuration. Field names map 1:1 to the original
/// `SCREAMING_SNAKE_CASE` JSON keys via `serde(rename)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Config {
    #[serde(default = "default_results_dir")]
    pub results_dir: String,
    #[serde(default = "default_true")]
    pub skip_expired: bool,
    #[serde(default = "default_true")]
    pub retry_tasks: bool,
    #[serde(default)]
    pub retry_tasks_on_error: bool,
    #[serde(default = "default_true")]
    pub abrupt_task_kill: bool,
    #[serde(default)]
    pub recover_after_disconnect: bool,
    #[serde(default = "default_true")]
    pub log_outputs: bool,
    #[serde(default)]
    pub enable_root: bool,
    #[serde(default = "default_server_port")]
    pub server_port: u16,
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
    #[serde(default = "default_retry_interval")]
    pub retry_interval: u32,
    #[serde(default = "default_retry_period")]
    pub retry_period: u32,
    #[serde(default = "default_pre_send_interval")]
    pub pre_send_interval: u32,
    #[serde(default = "default_workload_padding")]
    pub workload_padding: u32,
    /// How long the controller waits for an ack before giving up on a
    /// session-start handshake. Absent from the original's JSON defaults;
    /// supplemented here (see DESIGN.md).
    #[serde(default = "default_session_wait")]
    pub session_wait: u32,
    #[serde(default)]
    pub numa_cores_faults: Option<String>,
    #[serde(default)]
    pub numa_cores_benchmarks: Option<String>,
    #[serde(default)]
    pub hosts: Vec<String>,
    #[serde(default)]
    pub aux_commands: Vec<String>,
    #[serde(default = "default_socket_timeout")]
    pub socket_timeout: u32,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            results_dir: default_results_dir(),
            skip_expired: true,
            retry_tasks: true,
            retry_tasks_on_error: false,
            abrupt_task_kill: true,
            recover_after_disconnect: false,
            log_outputs: true,
            enable_root: false,
            server_port: default_server_port(),
            max_requests: default_max_requests(),
            retry_interval: default_retry_interval(),
            retry_period: default_retry_period(),
            pre_send_interval: default_pre_send_interval(),
            workload_padding: default_workload_padding(),
            session_wait: default_session_wait(),
            numa_cores_faults: None,
            numa_cores_benchmarks: None,
            hosts: Vec::new(),
            aux_commands: Vec::new(),
            socket_timeout: default_socket_timeout(),
            max_connections: default_max_connections(),
        }
    }
}

impl Config {
    /// Loads configuration from `path`, falling back to defaults for
    /// anything the file doesn't specify. A missing or unreadable file is
    /// not an error: the caller gets the default configuration, mirroring
    /// the original tool's permissive `ConfigLoader`.
    pub fn load(path: Option<&Path>) -> Config {
        let Some(path) = path else {
            return Config::default();
        };
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::parse(&contents, path),
            Err(_) => Config::default(),
        }
    }

    /// Parses JSON or TOML contents (chosen by the file extension),
    /// merging over the default configuration. Returns an error only when
    /// parsing explicitly fails.
    pub fn parse(contents: &str, path: &Path) -> Config {
        let is_toml = path.extension().and_then(|e| e.to_str()) == Some("toml");
        let parsed: Result<Config, CoreError> = if is_toml {
            toml::from_str(contents).map_err(|e| CoreError::ConfigUnreadable(e.to_string()))
        } else {
            serde_json::from_str(contents).map_err(|e| CoreError::ConfigUnreadable(e.to_string()))
        };
        parsed.unwrap_or_default()
    }
}
