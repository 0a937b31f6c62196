// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::time::Duration;

use crate::error::ConfigError;
use crate::logs::level::LogLevel;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_FLUSH_ABORT_GRACE: Duration = Duration::from_secs(15);

/// Host-wide runtime configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Minimum function log level for handlers that declare none
    pub log_level: LogLevel,
    /// Filter for the runtime's own diagnostics (e.g., info, debug)
    pub diagnostics_level: String,
    /// Timeout for handlers that declare none
    pub default_timeout: Duration,
    /// Ceiling applied to every declared timeout
    pub max_timeout: Option<Duration>,
    /// Time after the timeout before pending log delivery is abandoned
    pub flush_abort_grace: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Debug,
            diagnostics_level: "info".to_string(),
            default_timeout: DEFAULT_TIMEOUT,
            max_timeout: None,
            flush_abort_grace: DEFAULT_FLUSH_ABORT_GRACE,
        }
    }
}

impl RuntimeConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let log_level = match env::var("FUNCTIONS_LOG_LEVEL") {
            Ok(val) => val
                .parse::<LogLevel>()
                .map_err(|e| ConfigError::Invalid(e.to_string()))?,
            Err(_) => LogLevel::Debug,
        };
        let diagnostics_level = env::var("FUNCTIONS_DIAGNOSTICS_LEVEL")
            .map(|val| val.to_lowercase())
            .unwrap_or_else(|_| "info".to_string());
        let default_timeout = millis_var("FUNCTIONS_DEFAULT_TIMEOUT_MS").unwrap_or(DEFAULT_TIMEOUT);
        let max_timeout = millis_var("FUNCTIONS_MAX_TIMEOUT_MS");
        let flush_abort_grace =
            millis_var("FUNCTIONS_FLUSH_ABORT_GRACE_MS").unwrap_or(DEFAULT_FLUSH_ABORT_GRACE);

        let config = Self {
            log_level,
            diagnostics_level,
            default_timeout,
            max_timeout,
            flush_abort_grace,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "Default timeout must be greater than 0".to_string(),
            ));
        }

        if self.max_timeout.is_some_and(|max| max.is_zero()) {
            return Err(ConfigError::Invalid(
                "Maximum timeout must be greater than 0".to_string(),
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.diagnostics_level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "Invalid diagnostics level '{}'. Must be one of: trace, debug, info, warn, error",
                self.diagnostics_level
            )));
        }

        Ok(())
    }

    /// The declared timeout, or the default, capped by the ceiling.
    #[must_use]
    pub fn effective_timeout(&self, declared: Option<Duration>) -> Duration {
        let timeout = declared.unwrap_or(self.default_timeout);
        match self.max_timeout {
            Some(max) => timeout.min(max),
            None => timeout,
        }
    }
}

fn millis_var(name: &str) -> Option<Duration> {
    env::var(name)
        .ok()
        .and_then(|val| val.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 5] = [
        "FUNCTIONS_LOG_LEVEL",
        "FUNCTIONS_DIAGNOSTICS_LEVEL",
        "FUNCTIONS_DEFAULT_TIMEOUT_MS",
        "FUNCTIONS_MAX_TIMEOUT_MS",
        "FUNCTIONS_FLUSH_ABORT_GRACE_MS",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(RuntimeConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_zero_timeout() {
        let config = RuntimeConfig {
            default_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = RuntimeConfig {
            max_timeout: Some(Duration::ZERO),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_invalid_diagnostics_level() {
        let config = RuntimeConfig {
            diagnostics_level: "verbose".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_effective_timeout() {
        let config = RuntimeConfig {
            max_timeout: Some(Duration::from_secs(60)),
            ..Default::default()
        };
        assert_eq!(config.effective_timeout(None), Duration::from_secs(30));
        assert_eq!(
            config.effective_timeout(Some(Duration::from_secs(10))),
            Duration::from_secs(10)
        );
        assert_eq!(
            config.effective_timeout(Some(Duration::from_secs(600))),
            Duration::from_secs(60)
        );
        assert_eq!(
            RuntimeConfig::default().effective_timeout(Some(Duration::from_secs(600))),
            Duration::from_secs(600)
        );
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        clear_env();
        assert_eq!(RuntimeConfig::from_env().unwrap(), RuntimeConfig::default());
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        clear_env();
        env::set_var("FUNCTIONS_LOG_LEVEL", "WARNING");
        env::set_var("FUNCTIONS_DIAGNOSTICS_LEVEL", "DEBUG");
        env::set_var("FUNCTIONS_DEFAULT_TIMEOUT_MS", "5000");
        env::set_var("FUNCTIONS_MAX_TIMEOUT_MS", "60000");
        env::set_var("FUNCTIONS_FLUSH_ABORT_GRACE_MS", "1000");

        let config = RuntimeConfig::from_env().unwrap();
        clear_env();

        assert_eq!(config.log_level, LogLevel::Warn);
        assert_eq!(config.diagnostics_level, "debug");
        assert_eq!(config.default_timeout, Duration::from_millis(5000));
        assert_eq!(config.max_timeout, Some(Duration::from_secs(60)));
        assert_eq!(config.flush_abort_grace, Duration::from_secs(1));
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_unknown_level() {
        clear_env();
        env::set_var("FUNCTIONS_LOG_LEVEL", "loud");
        let result = RuntimeConfig::from_env();
        clear_env();
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }
}
