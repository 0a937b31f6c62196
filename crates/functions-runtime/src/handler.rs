// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::context::Context;
use crate::events::Event;
use crate::http::{HttpRequest, HttpResult};
use crate::logs::level::LogLevel;

/// Handles an HTTP request.
#[async_trait]
pub trait HttpHandler: Send + Sync {
    async fn call(&self, ctx: Context, request: HttpRequest) -> anyhow::Result<HttpResult>;
}

/// Handles a timer firing.
#[async_trait]
pub trait TimerHandler: Send + Sync {
    async fn call(&self, ctx: Context, fire: TimerFire) -> anyhow::Result<()>;
}

/// Handles a pub/sub event delivery.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn call(&self, ctx: Context, event: Event) -> anyhow::Result<()>;
}

/// Adapts an async closure to the handler traits.
#[derive(Clone, Copy)]
pub struct HandlerFn<F>(F);

pub fn handler_fn<F>(f: F) -> HandlerFn<F> {
    HandlerFn(f)
}

#[async_trait]
impl<F, Fut> HttpHandler for HandlerFn<F>
where
    F: Fn(Context, HttpRequest) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<HttpResult>> + Send + 'static,
{
    async fn call(&self, ctx: Context, request: HttpRequest) -> anyhow::Result<HttpResult> {
        (self.0)(ctx, request).await
    }
}

#[async_trait]
impl<F, Fut> TimerHandler for HandlerFn<F>
where
    F: Fn(Context, TimerFire) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn call(&self, ctx: Context, fire: TimerFire) -> anyhow::Result<()> {
        (self.0)(ctx, fire).await
    }
}

#[async_trait]
impl<F, Fut> EventHandler for HandlerFn<F>
where
    F: Fn(Context, Event) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn call(&self, ctx: Context, event: Event) -> anyhow::Result<()> {
        (self.0)(ctx, event).await
    }
}

/// One firing of a cron schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerFire {
    pub schedule: String,
    pub trigger_time: DateTime<Utc>,
}

/// Where a handler was declared.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HandlerMetadata {
    pub package_name: String,
    pub file_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
}

/// Declared configuration of a handler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandlerConfig {
    pub compute: Option<String>,
    pub memory: Option<u32>,
    /// Keeps request and response bodies out of log lines.
    pub exclude_body_from_logs: bool,
    pub minimum_log_level: Option<LogLevel>,
    /// Capped by the host ceiling when one is configured.
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HttpRoute {
    pub method: http::Method,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Schedule {
    pub cron: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subscription {
    pub topic: String,
    /// `None` subscribes to every type on the topic.
    pub event_type: Option<String>,
}

impl Subscription {
    #[must_use]
    pub fn matches(&self, topic: &str, event_type: &str) -> bool {
        let type_matches = match &self.event_type {
            Some(expected) => expected == event_type,
            None => true,
        };
        self.topic == topic && type_matches
    }
}

/// A registered handler together with its trigger and configuration.
pub struct HandlerRecord<T, H: ?Sized> {
    pub metadata: Option<HandlerMetadata>,
    pub config: HandlerConfig,
    pub trigger: T,
    pub entry: Arc<H>,
}

impl<T: Clone, H: ?Sized> Clone for HandlerRecord<T, H> {
    fn clone(&self) -> Self {
        Self {
            metadata: self.metadata.clone(),
            config: self.config.clone(),
            trigger: self.trigger.clone(),
            entry: Arc::clone(&self.entry),
        }
    }
}

impl<T: fmt::Debug, H: ?Sized> fmt::Debug for HandlerRecord<T, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRecord")
            .field("metadata", &self.metadata)
            .field("config", &self.config)
            .field("trigger", &self.trigger)
            .finish_non_exhaustive()
    }
}

pub type HttpRecord = HandlerRecord<HttpRoute, dyn HttpHandler>;
pub type TimerRecord = HandlerRecord<Schedule, dyn TimerHandler>;
pub type EventRecord = HandlerRecord<Subscription, dyn EventHandler>;
