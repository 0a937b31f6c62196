// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Failure reported by a log or event transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct TransportError(pub String);

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Errors surfaced by `Logger::flush` and the log buffer service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LogError {
    #[error("Log delivery failed: {0}")]
    Transport(#[from] TransportError),

    #[error("Log delivery aborted")]
    Aborted,

    #[error("Log buffer service stopped")]
    ServiceStopped,
}

/// Errors returned when a handler publishes an event.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EmitError {
    #[error("Event delivery failed: {0}")]
    Transport(#[from] TransportError),

    #[error("Invocation cancelled before the event was sent")]
    Cancelled,

    #[error("No event transport configured")]
    Unavailable,
}

/// Several failures reported as one, e.g. from a fan-out of parallel work.
///
/// Logged errors of this type carry an `errors` array with each failure
/// normalized independently.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct AggregateError {
    pub message: String,
    pub errors: Vec<anyhow::Error>,
}

impl AggregateError {
    pub fn new(message: impl Into<String>, errors: Vec<anyhow::Error>) -> Self {
        Self {
            message: message.into(),
            errors,
        }
    }
}

/// Errors raised while loading or validating runtime configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to install diagnostics subscriber: {0}")]
    Diagnostics(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = LogError::from(TransportError::new("connection reset"));
        assert_eq!(error.to_string(), "Log delivery failed: connection reset");

        let error = ConfigError::Invalid("timeout must be greater than 0".to_string());
        assert_eq!(
            error.to_string(),
            "Invalid configuration: timeout must be greater than 0"
        );
    }

    #[test]
    fn test_emit_error_from_transport() {
        let error: EmitError = TransportError::new("topic not found").into();
        assert_eq!(
            error,
            EmitError::Transport(TransportError::new("topic not found"))
        );
    }
}
