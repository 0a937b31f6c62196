// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use serde_json::Value;
use std::time::Duration;

use crate::logs::level::LogLevel;

/// One captured function log line, already rendered to JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub level: LogLevel,
    /// Monotonic offset from the logger's clock origin.
    pub timestamp_offset: Duration,
    pub message: String,
    /// Normalized error, if one was reported.
    pub error: Option<Value>,
    pub json: String,
}

impl LogEntry {
    /// Serialized size used for size-triggered flushes.
    #[must_use]
    pub fn byte_size(&self) -> usize {
        self.json.len()
    }
}
