// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Severity of a function log line.
///
/// The numeric urgency runs from `Fatal` (0, always emitted) to `Trace`
/// (5, most verbose). A logger configured with a minimum level drops every
/// line whose urgency is numerically greater than the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Fatal,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub const ALL: [LogLevel; 6] = [
        LogLevel::Trace,
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Warn,
        LogLevel::Error,
        LogLevel::Fatal,
    ];

    #[must_use]
    pub const fn urgency(self) -> u8 {
        match self {
            LogLevel::Fatal => 0,
            LogLevel::Error => 1,
            LogLevel::Warn => 2,
            LogLevel::Info => 3,
            LogLevel::Debug => 4,
            LogLevel::Trace => 5,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            LogLevel::Fatal => "fatal",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }

    /// Whether a line at this level passes the given minimum level.
    #[must_use]
    pub const fn is_enabled(self, minimum: LogLevel) -> bool {
        self.urgency() <= minimum.urgency()
    }

    /// Error and fatal lines force an immediate flush of a batching buffer.
    #[must_use]
    pub const fn is_urgent(self) -> bool {
        self.urgency() <= 1
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown log level '{0}'. Must be one of: trace, debug, info, warn, error, fatal")]
pub struct ParseLevelError(String);

impl FromStr for LogLevel {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            "fatal" => Ok(LogLevel::Fatal),
            other => Err(ParseLevelError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urgency_ordering() {
        let urgencies: Vec<u8> = LogLevel::ALL.iter().map(|l| l.urgency()).collect();
        assert_eq!(urgencies, vec![5, 4, 3, 2, 1, 0]);
    }

    #[test]
    fn test_fatal_always_enabled() {
        for minimum in LogLevel::ALL {
            assert!(LogLevel::Fatal.is_enabled(minimum));
        }
    }

    #[test]
    fn test_threshold() {
        assert!(LogLevel::Info.is_enabled(LogLevel::Info));
        assert!(LogLevel::Warn.is_enabled(LogLevel::Info));
        assert!(!LogLevel::Debug.is_enabled(LogLevel::Info));
        assert!(!LogLevel::Trace.is_enabled(LogLevel::Debug));
    }

    #[test]
    fn test_parse() {
        assert_eq!("WARNING".parse::<LogLevel>(), Ok(LogLevel::Warn));
        assert_eq!(" trace ".parse::<LogLevel>(), Ok(LogLevel::Trace));
        assert!("verbose".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_urgent_levels() {
        assert!(LogLevel::Fatal.is_urgent());
        assert!(LogLevel::Error.is_urgent());
        assert!(!LogLevel::Warn.is_urgent());
    }
}
