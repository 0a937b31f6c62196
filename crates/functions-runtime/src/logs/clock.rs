// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, SecondsFormat, Utc};
use std::time::{Duration, Instant};

/// Monotonic timestamp source for log lines.
///
/// Wall-clock time is read once when the clock is created; every later
/// timestamp is that origin plus the monotonic time elapsed since, so lines
/// never go backwards when the system clock is adjusted mid-invocation.
#[derive(Debug, Clone, Copy)]
pub struct LogClock {
    origin: DateTime<Utc>,
    anchor: Instant,
}

impl Default for LogClock {
    fn default() -> Self {
        Self::new()
    }
}

impl LogClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Utc::now(),
            anchor: Instant::now(),
        }
    }

    #[must_use]
    pub fn with_origin(origin: DateTime<Utc>) -> Self {
        Self {
            origin,
            anchor: Instant::now(),
        }
    }

    /// Monotonic offset since the clock was created.
    #[must_use]
    pub fn offset(&self) -> Duration {
        self.anchor.elapsed()
    }

    #[must_use]
    pub fn timestamp_at(&self, offset: Duration) -> DateTime<Utc> {
        chrono::Duration::from_std(offset)
            .ok()
            .and_then(|delta| self.origin.checked_add_signed(delta))
            .unwrap_or(self.origin)
    }

    /// ISO-8601 rendering with microsecond precision.
    #[must_use]
    pub fn format(&self, offset: Duration) -> String {
        self.timestamp_at(offset)
            .to_rfc3339_opts(SecondsFormat::Micros, true)
    }
}
