// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! In-memory transports for testing

use functions_runtime::error::TransportError;
use functions_runtime::events::{Event, EventTransport};
use functions_runtime::logs::entry::LogEntry;
use functions_runtime::logs::transport::{Delivery, LogTransport};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// Log transport that records batches and completes them asynchronously
#[derive(Clone, Default)]
pub struct MemoryTransport {
    synchronous: bool,
    hanging: bool,
    batches: Arc<Mutex<Vec<Vec<LogEntry>>>>,
}

#[allow(dead_code)]
impl MemoryTransport {
    pub fn asynchronous() -> Self {
        Self::default()
    }

    pub fn synchronous() -> Self {
        Self {
            synchronous: true,
            ..Self::default()
        }
    }

    /// Records batches but never completes their delivery
    pub fn hanging() -> Self {
        Self {
            hanging: true,
            ..Self::default()
        }
    }

    pub fn batches(&self) -> Vec<Vec<LogEntry>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.batches()
            .into_iter()
            .flatten()
            .map(|entry| entry.message)
            .collect()
    }

    pub fn lines(&self) -> Vec<Value> {
        self.batches()
            .into_iter()
            .flatten()
            .map(|entry| serde_json::from_str(&entry.json).unwrap())
            .collect()
    }
}

impl LogTransport for MemoryTransport {
    fn send_entries(&self, batch: Vec<LogEntry>, _signal: CancellationToken) -> Delivery {
        self.batches.lock().unwrap().push(batch);
        if self.synchronous {
            Delivery::Complete(Ok(()))
        } else if self.hanging {
            Delivery::pending(std::future::pending())
        } else {
            Delivery::pending(async {
                tokio::task::yield_now().await;
                Ok(())
            })
        }
    }
}

/// Event bus that records every published event
#[derive(Clone, Default)]
pub struct RecordingEventBus {
    events: Arc<Mutex<Vec<Event>>>,
}

#[allow(dead_code)]
impl RecordingEventBus {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl EventTransport for RecordingEventBus {
    async fn send_event(
        &self,
        event: Event,
        _signal: CancellationToken,
    ) -> Result<(), TransportError> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}
