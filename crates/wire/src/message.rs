// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `Message` tagged union: every payload that can cross the wire
//! between a controller and an engine.

use finj_core::Task;
use serde::{Deserialize, Serialize};

/// The task-shaped fields carried by `command_start`/`status_*` messages,
/// matching the fields of a `Task` plus whatever the message type adds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskFields {
    pub args: String,
    pub duration: u32,
    #[serde(rename = "seqNum")]
    pub seq_num: u32,
    pub timestamp: u32,
    #[serde(rename = "isFault")]
    pub is_fault: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cores: Option<String>,
}

impl From<&Task> for TaskFields {
    fn from(t: &Task) -> Self {
        TaskFields {
            args: t.args.clone(),
            duration: t.duration,
            seq_num: t.seq_num,
            timestamp: t.timestamp,
            is_fault: t.is_fault,
            cores: t.cores.clone(),
        }
    }
}

impl From<TaskFields> for Task {
    fn from(f: TaskFields) -> Self {
        Task {
            args: f.args,
            duration: f.duration,
            seq_num: f.seq_num,
            timestamp: f.timestamp,
            is_fault: f.is_fault,
            cores: f.cores,
        }
    }
}

/// Every wire message type exchanged between controller and engine.
///
/// Tagged by its `type` field, matching the original protocol's
/// string-identifier message types one-to-one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    #[serde(rename = "ack_yes")]
    AckYes {
        timestamp: i64,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<i32>,
    },
    #[serde(rename = "ack_no")]
    AckNo {
        timestamp: i64,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<i32>,
    },
    #[serde(rename = "command_greet")]
    CommandGreet { timestamp: i64 },
    #[serde(rename = "command_set_time")]
    CommandSetTime { timestamp: i64 },
    #[serde(rename = "command_correct_time")]
    CommandCorrectTime { timestamp: i64 },
    #[serde(rename = "command_session_s")]
    CommandSessionStart { timestamp: i64 },
    #[serde(rename = "command_session_e")]
    CommandSessionEnd { timestamp: i64 },
    #[serde(rename = "command_term")]
    CommandTerminate,
    #[serde(rename = "command_start")]
    CommandStart(#[serde(flatten)] TaskFields),
    #[serde(rename = "status_start")]
    StatusStart(#[serde(flatten)] TaskFields),
    #[serde(rename = "status_restart")]
    StatusRestart {
        #[serde(flatten)]
        task: TaskFields,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<i32>,
    },
    #[serde(rename = "status_end")]
    StatusEnd {
        #[serde(flatten)]
        task: TaskFields,
        #[serde(skip_serializing_if = "Option::is_none")]
        output: Option<String>,
    },
    #[serde(rename = "status_err")]
    StatusErr {
        #[serde(flatten)]
        task: TaskFields,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<i32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        output: Option<String>,
    },
    #[serde(rename = "status_greet")]
    StatusGreet {
        timestamp: i64,
        /// Matches the original's `FIELD_DATA` slot, reused to carry the
        /// active-task count in a greet reply.
        #[serde(rename = "args")]
        active_tasks: u32,
        #[serde(rename = "isFault")]
        session_active: bool,
    },
    #[serde(rename = "status_reset")]
    StatusReset { timestamp: i64 },
    #[serde(rename = "detected_lost")]
    DetectedLost { timestamp: i64 },
    #[serde(rename = "detected_restored")]
    DetectedRestored { timestamp: i64 },
}

impl Message {
    pub fn type_name(&self) -> &'static str {
        match self {
            Message::AckYes { .. } => "ack_yes",
            Message::AckNo { .. } => "ack_no",
            Message::CommandGreet { .. } => "command_greet",
            Message::CommandSetTime { .. } => "command_set_time",
            Message::CommandCorrectTime { .. } => "command_correct_time",
            Message::CommandSessionStart { .. } => "command_session_s",
            Message::CommandSessionEnd { .. } => "command_session_e",
            Message::CommandTerminate => "command_term",
            Message::CommandStart(_) => "command_start",
            Message::StatusStart(_) => "status_start",
            Message::StatusRestart { .. } => "status_restart",
            Message::StatusEnd { .. } => "status_end",
            Message::StatusErr { .. } => "status_err",
            Message::StatusGreet { .. } => "status_greet",
            Message::StatusReset { .. } => "status_reset",
            Message::DetectedLost { .. } => "detected_lost",
            Message::DetectedRestored { .. } => "detected_restored",
        }
    }

    pub fn ack(timestamp: i64, positive: bool, error: Option<i32>) -> Message {
        if positive {
            Message::AckYes { timestamp, error }
        } else {
            Message::AckNo { timestamp, error }
        }
    }

    pub fn command_start(task: &Task) -> Message {
        Message::CommandStart(task.into())
    }

    pub fn status_start(task: &Task) -> Message {
        Message::StatusStart(task.into())
    }

    pub fn status_end(task: &Task, output: Option<String>) -> Message {
        Message::StatusEnd { task: task.into(), output }
    }

    pub fn status_error(task: &Task, error: Option<i32>, output: Option<String>) -> Message {
        Message::StatusErr { task: task.into(), error, output }
    }

    pub fn status_greet(timestamp: i64, active_tasks: u32, session_active: bool) -> Message {
        Message::StatusGreet { timestamp, active_tasks, session_active }
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
