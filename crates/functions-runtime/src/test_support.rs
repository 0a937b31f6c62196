// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::TransportError;
use crate::logs::entry::LogEntry;
use crate::logs::level::LogLevel;
use crate::logs::transport::{Delivery, LogTransport};

#[derive(Clone, Copy, Debug)]
enum Behavior {
    Synchronous,
    Asynchronous,
    Failing(&'static str),
    Hanging,
}

/// Log transport recording every batch it is handed.
#[derive(Clone)]
pub(crate) struct MemoryTransport {
    behavior: Behavior,
    batches: Arc<Mutex<Vec<Vec<LogEntry>>>>,
    signals: Arc<Mutex<Vec<CancellationToken>>>,
}

impl MemoryTransport {
    fn with_behavior(behavior: Behavior) -> Self {
        Self {
            behavior,
            batches: Arc::default(),
            signals: Arc::default(),
        }
    }

    pub(crate) fn synchronous() -> Self {
        Self::with_behavior(Behavior::Synchronous)
    }

    pub(crate) fn asynchronous() -> Self {
        Self::with_behavior(Behavior::Asynchronous)
    }

    pub(crate) fn failing(message: &'static str) -> Self {
        Self::with_behavior(Behavior::Failing(message))
    }

    pub(crate) fn hanging() -> Self {
        Self::with_behavior(Behavior::Hanging)
    }

    pub(crate) fn batches(&self) -> Vec<Vec<LogEntry>> {
        self.batches.lock().unwrap().clone()
    }

    pub(crate) fn messages_by_batch(&self) -> Vec<Vec<String>> {
        self.batches()
            .into_iter()
            .map(|batch| batch.into_iter().map(|entry| entry.message).collect())
            .collect()
    }

    pub(crate) fn signals(&self) -> Vec<CancellationToken> {
        self.signals.lock().unwrap().clone()
    }
}

impl LogTransport for MemoryTransport {
    fn send_entries(&self, batch: Vec<LogEntry>, signal: CancellationToken) -> Delivery {
        self.batches.lock().unwrap().push(batch);
        self.signals.lock().unwrap().push(signal);
        match self.behavior {
            Behavior::Synchronous => Delivery::Complete(Ok(())),
            Behavior::Asynchronous => Delivery::pending(async { Ok(()) }),
            Behavior::Failing(message) => Delivery::Complete(Err(TransportError::new(message))),
            Behavior::Hanging => Delivery::pending(std::future::pending()),
        }
    }
}

pub(crate) fn entry(level: LogLevel, message: &str) -> LogEntry {
    LogEntry {
        level,
        timestamp_offset: Duration::ZERO,
        message: message.to_string(),
        error: None,
        json: serde_json::json!({ "level": level.as_str(), "message": message }).to_string(),
    }
}
