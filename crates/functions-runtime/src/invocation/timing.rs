// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use std::time::Instant;

use crate::logs::enrichment::fields;
use crate::logs::level::LogLevel;
use crate::logs::logger::Logger;

/// Logs the handler's execution time when dropped, so the line is written
/// whether the handler returned, failed or was abandoned.
pub(crate) struct ExecutionTimer {
    log: Logger,
    started_at: DateTime<Utc>,
    started: Instant,
}

impl ExecutionTimer {
    pub(crate) fn start(log: &Logger) -> Self {
        Self {
            log: log.clone(),
            started_at: Utc::now(),
            started: Instant::now(),
        }
    }
}

impl Drop for ExecutionTimer {
    fn drop(&mut self) {
        let elapsed = self.started.elapsed();
        let ended_at = chrono::Duration::from_std(elapsed)
            .ok()
            .and_then(|delta| self.started_at.checked_add_signed(delta))
            .unwrap_or(self.started_at);
        let start = self.started_at.to_rfc3339_opts(SecondsFormat::Micros, true);
        let end = ended_at.to_rfc3339_opts(SecondsFormat::Micros, true);
        let timing = fields([
            ("start", Value::from(start)),
            ("end", Value::from(end)),
            ("duration_ms", Value::from(elapsed.as_secs_f64() * 1000.0)),
        ]);
        self.log
            .log(LogLevel::Trace, "Execution time", None, Some(&timing));
    }
}
