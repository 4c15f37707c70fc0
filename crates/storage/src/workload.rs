// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CSV workload reader/writer. A workload file holds one `Task` per row,
//! with a header row naming the columns so the order in which they were
//! written doesn't have to match the order they're read back in.

use std::fs::File;
use std::path::Path;

use finj_core::Task;

use crate::csv_format::{bool_str, opt_string, reader_builder, writer_builder, NONE_VALUE};
use crate::error::StorageError;

/// Reads a time-ordered workload of tasks from a CSV file.
pub struct WorkloadReader {
    reader: csv::Reader<File>,
}

impl WorkloadReader {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let reader = reader_builder().from_path(path)?;
        Ok(Self { reader })
    }

    /// Reads the next task, or `None` at end of file. A malformed row
    /// (missing a required column, an unparsable number) is reported as
    /// an error rather than silently skipped, since a corrupt workload
    /// file should stop the controller rather than run a subset of it.
    pub fn read_entry(&mut self) -> Result<Option<Task>, StorageError> {
        let headers = self.reader.headers()?.clone();
        let mut record = csv::StringRecord::new();
        if !self.reader.read_record(&mut record)? {
            return Ok(None);
        }
        let get = |name: &str| -> Result<&str, StorageError> {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .and_then(|i| record.get(i))
                .map(str::trim)
                .ok_or_else(|| StorageError::MalformedEntry(format!("missing column {name}")))
        };
        let parse_u32 = |name: &str| -> Result<u32, StorageError> {
            get(name)?.parse().map_err(|_| StorageError::MalformedEntry(name.to_string()))
        };
        let cores = match get("cores")? {
            NONE_VALUE | "" => None,
            other => Some(other.to_string()),
        };
        Ok(Some(Task {
            args: get("args")?.to_string(),
            timestamp: parse_u32("timestamp")?,
            duration: parse_u32("duration")?,
            seq_num: parse_u32("seqNum")?,
            is_fault: get("isFault")? == "True",
            cores,
        }))
    }
}

/// Writes a workload of tasks to a CSV file, in the same dialect
/// [`WorkloadReader`] expects.
pub struct WorkloadWriter {
    writer: csv::Writer<File>,
}

const WORKLOAD_COLUMNS: [&str; 6] = ["args", "cores", "duration", "isFault", "seqNum", "timestamp"];

impl WorkloadWriter {
    pub fn create(path: &Path) -> Result<Self, StorageError> {
        let mut writer = writer_builder().from_path(path)?;
        writer.write_record(WORKLOAD_COLUMNS)?;
        Ok(Self { writer })
    }

    pub fn write_entry(&mut self, task: &Task) -> Result<(), StorageError> {
        self.writer.write_record([
            task.args.as_str(),
            &opt_string(&task.cores),
            &task.duration.to_string(),
            bool_str(task.is_fault),
            &task.seq_num.to_string(),
            &task.timestamp.to_string(),
        ])?;
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "workload_tests.rs"]
mod tests;
