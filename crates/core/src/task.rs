// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `Task`: one scheduled entry of a workload.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Sentinel duration meaning "no bounded duration" — the task runs to
/// completion instead of being killed after a fixed interval.
pub const DURATION_UNBOUNDED: u32 = 0;

/// A single scheduled unit of work read from a workload file, or
/// reconstructed from a `command_start` wire message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Raw command line, split with POSIX quoting rules before spawning.
    pub args: String,
    /// Seconds since workload start at which the task should run.
    pub timestamp: u32,
    /// Seconds after which the task subprocess is killed; 0 = unbounded.
    pub duration: u32,
    pub seq_num: u32,
    pub is_fault: bool,
    /// Core affinity list, e.g. "0,1,2"; None means no restriction.
    pub cores: Option<String>,
}

impl Default for Task {
    fn default() -> Self {
        Task {
            args: String::new(),
            timestamp: 0,
            duration: DURATION_UNBOUNDED,
            seq_num: 0,
            is_fault: false,
            cores: None,
        }
    }
}

impl Task {
    /// Splits `args` into argv entries using POSIX shell quoting, the way
    /// the original tool invokes tasks directly rather than through a
    /// shell.
    pub fn argv(&self) -> Result<Vec<String>, CoreError> {
        shlex::split(&self.args)
            .ok_or_else(|| CoreError::MalformedTask(format!("unbalanced quoting in args: {}", self.args)))
    }

    /// Builds a `Task` from a workload CSV row, keyed by field name.
    pub fn from_fields(fields: &std::collections::HashMap<String, String>) -> Result<Task, CoreError> {
        let get = |k: &str| -> Result<&String, CoreError> {
            fields.get(k).ok_or_else(|| CoreError::MalformedTask(format!("missing field {k}")))
        };
        Ok(Task {
            args: get("args")?.clone(),
            timestamp: get("timestamp")?
                .parse()
                .map_err(|_| CoreError::MalformedTask("timestamp".into()))?,
            duration: get("duration")?
                .parse()
                .map_err(|_| CoreError::MalformedTask("duration".into()))?,
            seq_num: get("seq_num")?
                .parse()
                .map_err(|_| CoreError::MalformedTask("seq_num".into()))?,
            is_fault: get("is_fault")? == "True",
            cores: match get("cores")?.as_str() {
                "None" | "" => None,
                other => Some(other.to_string()),
            },
        })
    }

    pub fn to_fields(&self) -> std::collections::HashMap<String, String> {
        let mut m = std::collections::HashMap::new();
        m.insert("args".to_string(), self.args.clone());
        m.insert("timestamp".to_string(), self.timestamp.to_string());
        m.insert("duration".to_string(), self.duration.to_string());
        m.insert("seq_num".to_string(), self.seq_num.to_string());
        m.insert("is_fault".to_string(), if self.is_fault { "True" } else { "False" }.to_string());
        m.insert("cores".to_string(), self.cores.clone().unwrap_or_else(|| "None".to_string()));
        m
    }
}
