// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared CSV dialect for both workload files and execution logs: `;`
//! delimiter, `|` quote character, and the literal string `None` standing
//! in for a missing value — matching Python's `csv` module conventions
//! the original tool relied on.

pub const DELIMITER: u8 = b';';
pub const QUOTE: u8 = b'|';
pub const NONE_VALUE: &str = "None";

pub fn reader_builder() -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder.delimiter(DELIMITER).quote(QUOTE).has_headers(true);
    builder
}

pub fn writer_builder() -> csv::WriterBuilder {
    let mut builder = csv::WriterBuilder::new();
    builder.delimiter(DELIMITER).quote(QUOTE);
    builder
}

pub fn opt_string(value: &Option<String>) -> String {
    value.clone().unwrap_or_else(|| NONE_VALUE.to_string())
}

pub fn opt_num<T: ToString>(value: &Option<T>) -> String {
    value.as_ref().map(ToString::to_string).unwrap_or_else(|| NONE_VALUE.to_string())
}

pub fn bool_str(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}
