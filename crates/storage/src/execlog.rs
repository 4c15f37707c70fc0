// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution-log writer: appends one row per status event the controller
//! (or a pull-mode listener) observes for a given engine, flushing after
//! every row so a killed process loses at most the in-flight write.

use std::fs::File;
use std::path::Path;

use finj_wire::Message;

use crate::csv_format::{bool_str, opt_num, opt_string, writer_builder, NONE_VALUE};
use crate::error::StorageError;

/// Column order matches the original tool's `MessageBuilder.FIELDS`: the
/// execution log's wire-contract column layout, pinned independent of
/// field order inside `Message`.
const LOG_COLUMNS: [&str; 8] =
    ["timestamp", "type", "args", "seqNum", "duration", "isFault", "cores", "error"];

struct LogRecord {
    timestamp: Option<i64>,
    type_name: &'static str,
    args: Option<String>,
    seq_num: Option<u32>,
    duration: Option<u32>,
    is_fault: Option<bool>,
    cores: Option<String>,
    error: Option<i32>,
}

impl LogRecord {
    fn bare(timestamp: i64, type_name: &'static str) -> Self {
        Self { timestamp: Some(timestamp), type_name, args: None, seq_num: None, duration: None, is_fault: None, cores: None, error: None }
    }
}

fn to_log_record(message: &Message) -> LogRecord {
    use finj_wire::TaskFields;
    let with_task = |timestamp: i64, type_name: &'static str, t: &TaskFields, error: Option<i32>| LogRecord {
        timestamp: Some(timestamp),
        type_name,
        args: Some(t.args.clone()),
        seq_num: Some(t.seq_num),
        duration: Some(t.duration),
        is_fault: Some(t.is_fault),
        cores: t.cores.clone(),
        error,
    };
    match message {
        Message::AckYes { timestamp, error } => {
            let mut r = LogRecord::bare(*timestamp, "ack_yes");
            r.error = *error;
            r
        }
        Message::AckNo { timestamp, error } => {
            let mut r = LogRecord::bare(*timestamp, "ack_no");
            r.error = *error;
            r
        }
        Message::CommandGreet { timestamp } => LogRecord::bare(*timestamp, "command_greet"),
        Message::CommandSetTime { timestamp } => LogRecord::bare(*timestamp, "command_set_time"),
        Message::CommandCorrectTime { timestamp } => LogRecord::bare(*timestamp, "command_correct_time"),
        Message::CommandSessionStart { timestamp } => LogRecord::bare(*timestamp, "command_session_s"),
        Message::CommandSessionEnd { timestamp } => LogRecord::bare(*timestamp, "command_session_e"),
        Message::CommandTerminate => LogRecord::bare(0, "command_term"),
        Message::CommandStart(t) => with_task(t.timestamp as i64, "command_start", t, None),
        Message::StatusStart(t) => with_task(t.timestamp as i64, "status_start", t, None),
        Message::StatusRestart { task, error } => with_task(task.timestamp as i64, "status_restart", task, *error),
        Message::StatusEnd { task, .. } => with_task(task.timestamp as i64, "status_end", task, None),
        Message::StatusErr { task, error, .. } => with_task(task.timestamp as i64, "status_err", task, *error),
        Message::StatusGreet { timestamp, .. } => LogRecord::bare(*timestamp, "status_greet"),
        Message::StatusReset { timestamp } => LogRecord::bare(*timestamp, "status_reset"),
        Message::DetectedLost { timestamp } => LogRecord::bare(*timestamp, "detected_lost"),
        Message::DetectedRestored { timestamp } => LogRecord::bare(*timestamp, "detected_restored"),
    }
}

pub struct ExecutionLogWriter {
    writer: csv::Writer<File>,
}

impl ExecutionLogWriter {
    pub fn create(path: &Path) -> Result<Self, StorageError> {
        let mut writer = writer_builder().from_path(path)?;
        writer.write_record(LOG_COLUMNS)?;
        writer.flush()?;
        Ok(Self { writer })
    }

    pub fn write_message(&mut self, message: &Message) -> Result<(), StorageError> {
        let r = to_log_record(message);
        self.writer.write_record([
            r.timestamp.map(|t| t.to_string()).unwrap_or_else(|| NONE_VALUE.to_string()),
            r.type_name.to_string(),
            opt_string(&r.args),
            opt_num(&r.seq_num),
            opt_num(&r.duration),
            r.is_fault.map(bool_str).unwrap_or(NONE_VALUE).to_string(),
            opt_string(&r.cores),
            opt_num(&r.error),
        ])?;
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "execlog_tests.rs"]
mod tests;
