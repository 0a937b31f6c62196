// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The runtime's own diagnostics, separate from function logs.

use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::config::RuntimeConfig;
use crate::error::ConfigError;

/// Filter directive for the configured diagnostics level.
#[must_use]
pub fn env_filter(config: &RuntimeConfig) -> String {
    format!("functions_runtime={}", config.diagnostics_level)
}

/// Installs a global fmt subscriber for runtime diagnostics.
///
/// # Errors
///
/// Fails if the level does not parse or a global subscriber is already set.
pub fn init(config: &RuntimeConfig) -> Result<(), ConfigError> {
    let filter = EnvFilter::try_new(env_filter(config))
        .map_err(|e| ConfigError::Diagnostics(e.to_string()))?;

    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| ConfigError::Diagnostics(e.to_string()))?;

    debug!("Diagnostics enabled at {}", config.diagnostics_level);
    Ok(())
}
