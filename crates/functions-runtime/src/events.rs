// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{EmitError, TransportError};
use crate::logs::enrichment::Fields;

/// A pub/sub event, as delivered to an event handler or published by one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub topic: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Fields>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

impl Event {
    pub fn new(
        topic: impl Into<String>,
        event_type: impl Into<String>,
        subject: impl Into<String>,
    ) -> Self {
        Self {
            topic: topic.into(),
            event_type: event_type.into(),
            subject: subject.into(),
            data: None,
            message_id: None,
        }
    }

    #[must_use]
    pub fn with_data(mut self, data: Fields) -> Self {
        self.data = Some(data);
        self
    }

    #[must_use]
    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }
}

/// Host-provided event bus.
#[async_trait]
pub trait EventTransport: Send + Sync {
    async fn send_event(&self, event: Event, signal: CancellationToken)
        -> Result<(), TransportError>;
}

/// Publishes events on behalf of handlers.
#[derive(Clone, Default)]
pub struct Emitter {
    transport: Option<Arc<dyn EventTransport>>,
}

impl fmt::Debug for Emitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("configured", &self.transport.is_some())
            .finish()
    }
}

impl Emitter {
    #[must_use]
    pub fn new(transport: Arc<dyn EventTransport>) -> Self {
        Self {
            transport: Some(transport),
        }
    }

    /// An emitter for hosts without an event bus.
    #[must_use]
    pub fn unavailable() -> Self {
        Self { transport: None }
    }

    /// Sends `event`, giving up as soon as `signal` is cancelled.
    pub async fn emit(&self, event: Event, signal: &CancellationToken) -> Result<(), EmitError> {
        if signal.is_cancelled() {
            return Err(EmitError::Cancelled);
        }
        let transport = self.transport.as_ref().ok_or(EmitError::Unavailable)?;

        debug!(
            "Emitting event {} of type {} to topic {}",
            event.subject, event.event_type, event.topic
        );
        tokio::select! {
            result = transport.send_event(event, signal.clone()) => result.map_err(EmitError::from),
            () = signal.cancelled() => Err(EmitError::Cancelled),
        }
    }
}
