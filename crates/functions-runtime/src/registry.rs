// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Handler registration.
//!
//! Packages declare their handlers against a [`RegistryBuilder`] during
//! bootstrap; [`RegistryBuilder::build`] freezes the tables into a
//! [`Registry`] the runtime dispatches from.

use std::sync::Arc;
use tracing::debug;

use crate::handler::{
    EventHandler, EventRecord, HandlerConfig, HandlerMetadata, HandlerRecord, HttpHandler,
    HttpRecord, HttpRoute, Schedule, Subscription, TimerHandler, TimerRecord,
};

#[derive(Default)]
pub struct RegistryBuilder {
    metadata: Option<HandlerMetadata>,
    http: Vec<HttpRecord>,
    timers: Vec<TimerRecord>,
    events: Vec<EventRecord>,
}

impl RegistryBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamps `metadata` onto every handler registered after this call.
    #[must_use]
    pub fn with_metadata(mut self, metadata: HandlerMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    #[must_use]
    pub fn http<H>(
        mut self,
        method: http::Method,
        path: impl Into<String>,
        config: HandlerConfig,
        handler: H,
    ) -> Self
    where
        H: HttpHandler + 'static,
    {
        let trigger = HttpRoute {
            method,
            path: path.into(),
        };
        debug!(
            "Registering HTTP handler {} {}",
            trigger.method, trigger.path
        );
        let entry: Arc<dyn HttpHandler> = Arc::new(handler);
        self.http.push(self.record(trigger, config, entry));
        self
    }

    #[must_use]
    pub fn timer<H>(mut self, cron: impl Into<String>, config: HandlerConfig, handler: H) -> Self
    where
        H: TimerHandler + 'static,
    {
        let trigger = Schedule { cron: cron.into() };
        debug!("Registering timer handler {}", trigger.cron);
        let entry: Arc<dyn TimerHandler> = Arc::new(handler);
        self.timers.push(self.record(trigger, config, entry));
        self
    }

    #[must_use]
    pub fn event<H>(
        mut self,
        topic: impl Into<String>,
        event_type: Option<String>,
        config: HandlerConfig,
        handler: H,
    ) -> Self
    where
        H: EventHandler + 'static,
    {
        let trigger = Subscription {
            topic: topic.into(),
            event_type,
        };
        debug!("Registering event handler for topic {}", trigger.topic);
        let entry: Arc<dyn EventHandler> = Arc::new(handler);
        self.events.push(self.record(trigger, config, entry));
        self
    }

    fn record<T, H: ?Sized>(
        &self,
        trigger: T,
        config: HandlerConfig,
        entry: Arc<H>,
    ) -> HandlerRecord<T, H> {
        HandlerRecord {
            metadata: self.metadata.clone(),
            config,
            trigger,
            entry,
        }
    }

    #[must_use]
    pub fn build(self) -> Registry {
        debug!(
            "Registry built with {} HTTP, {} timer and {} event handlers",
            self.http.len(),
            self.timers.len(),
            self.events.len()
        );
        Registry {
            http: self.http.into(),
            timers: self.timers.into(),
            events: self.events.into(),
        }
    }
}

/// Frozen handler tables.
#[derive(Clone, Debug)]
pub struct Registry {
    http: Arc<[HttpRecord]>,
    timers: Arc<[TimerRecord]>,
    events: Arc<[EventRecord]>,
}

impl Registry {
    #[must_use]
    pub fn http_routes(&self) -> &[HttpRecord] {
        &self.http
    }

    #[must_use]
    pub fn timers(&self) -> &[TimerRecord] {
        &self.timers
    }

    #[must_use]
    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }

    /// Exact match on method and path.
    #[must_use]
    pub fn find_http(&self, method: &http::Method, path: &str) -> Option<&HttpRecord> {
        self.http
            .iter()
            .find(|record| record.trigger.method == method && record.trigger.path == path)
    }

    #[must_use]
    pub fn find_timer(&self, cron: &str) -> Option<&TimerRecord> {
        self.timers
            .iter()
            .find(|record| record.trigger.cron == cron)
    }

    /// Every handler subscribed to `topic` for `event_type`, in registration
    /// order.
    pub fn subscribers<'a>(
        &'a self,
        topic: &'a str,
        event_type: &'a str,
    ) -> impl Iterator<Item = &'a EventRecord> + 'a {
        self.events
            .iter()
            .filter(move |record| record.trigger.matches(topic, event_type))
    }
}
