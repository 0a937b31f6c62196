// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use serde_json::Value;
use tracing::debug;

use crate::error::LogError;
use crate::logs::buffer::LogBufferHandle;
use crate::logs::clock::LogClock;
use crate::logs::enrichment::{fields, Enrichment, Fields};
use crate::logs::entry::LogEntry;
use crate::logs::level::LogLevel;
use crate::logs::serializer::{serialize_entry, ErrorValue};

/// Structured function logger.
///
/// A `Logger` is an immutable value: enriching returns a new logger that
/// shares the same buffer, clock and threshold, so loggers handed down a
/// call chain never leak fields back to their parents.
#[derive(Clone, Debug)]
pub struct Logger {
    buffer: LogBufferHandle,
    clock: LogClock,
    minimum_level: LogLevel,
    reserved: Enrichment,
    custom: Enrichment,
}

impl Logger {
    #[must_use]
    pub fn new(buffer: LogBufferHandle, clock: LogClock) -> Self {
        Self {
            buffer,
            clock,
            minimum_level: LogLevel::Debug,
            reserved: Enrichment::new(),
            custom: Enrichment::new(),
        }
    }

    #[must_use]
    pub fn with_minimum_level(mut self, level: LogLevel) -> Self {
        self.minimum_level = level;
        self
    }

    #[must_use]
    pub fn minimum_level(&self) -> LogLevel {
        self.minimum_level
    }

    /// Returns a logger whose lines carry `pairs` on top of this logger's
    /// custom fields.
    #[must_use]
    pub fn enrich<I, K, V>(&self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Self {
            custom: self.custom.with(fields(pairs)),
            ..self.clone()
        }
    }

    /// Like [`Logger::enrich`], for system metadata attached by the
    /// invocation wrappers.
    #[must_use]
    pub fn enrich_reserved<I, K, V>(&self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Self {
            reserved: self.reserved.with(fields(pairs)),
            ..self.clone()
        }
    }

    pub fn trace(&self, message: &str) {
        self.log(LogLevel::Trace, message, None, None);
    }

    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message, None, None);
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message, None, None);
    }

    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message, None, None);
    }

    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, message, None, None);
    }

    pub fn fatal(&self, message: &str) {
        self.log(LogLevel::Fatal, message, None, None);
    }

    pub fn warn_with<'a>(&self, message: &str, error: impl Into<ErrorValue<'a>>) {
        self.log(LogLevel::Warn, message, Some(&error.into()), None);
    }

    /// Logs at error level with a normalized error attached.
    pub fn error_with<'a>(&self, message: &str, error: impl Into<ErrorValue<'a>>) {
        self.log(LogLevel::Error, message, Some(&error.into()), None);
    }

    pub fn fatal_with<'a>(&self, message: &str, error: impl Into<ErrorValue<'a>>) {
        self.log(LogLevel::Fatal, message, Some(&error.into()), None);
    }

    /// Logs one line carrying `fields` without enriching the logger.
    pub fn log_fields(&self, level: LogLevel, message: &str, fields: &Fields) {
        self.log(level, message, None, Some(fields));
    }

    /// Serializes and queues one line.
    ///
    /// Lines above the minimum level are dropped before serialization and
    /// never reach the buffer.
    pub fn log(
        &self,
        level: LogLevel,
        message: &str,
        error: Option<&ErrorValue<'_>>,
        fields: Option<&Fields>,
    ) {
        if !level.is_enabled(self.minimum_level) {
            return;
        }

        let offset = self.clock.offset();
        let timestamp = self.clock.format(offset);
        let serialized = serialize_entry(
            &timestamp,
            level,
            message,
            error,
            fields,
            &self.reserved,
            &self.custom,
        );
        let entry = LogEntry {
            level,
            timestamp_offset: offset,
            message: message.to_string(),
            error: serialized.error,
            json: serialized.json,
        };

        if self.buffer.collect(entry).is_err() {
            debug!("Log buffer stopped, dropping {level} line");
        }
    }

    /// Delivers every line queued so far by any logger sharing this buffer.
    pub async fn flush(&self) -> Result<(), LogError> {
        self.buffer.flush().await
    }
}
