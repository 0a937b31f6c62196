// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Dispatch entry points for hosts.
//!
//! Every invocation gets its own log buffer, its own pair of cancellation
//! tokens and its own timeout coordinator:
//!
//! ```text
//!   shutdown token (runtime)
//!         └── outer token (flush abort, shared with the log transport)
//!               └── inner token (handler signal)
//! ```
//!
//! The handler only sees the inner token. Cancelling the outer token also
//! cancels the inner one, never the reverse.

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, debug_span, warn, Instrument};

use crate::config::RuntimeConfig;
use crate::context::{ClientInfo, Clock, ContextParts, Environment, SuccessCallbacks};
use crate::error::LogError;
use crate::events::{Emitter, Event, EventTransport};
use crate::handler::{
    EventRecord, HandlerConfig, HandlerMetadata, HttpRecord, TimerFire, TimerRecord,
};
use crate::http::{finalize, HttpRequest, ShapedResponse};
use crate::invocation::{self, InvocationOutcome, TimeoutCoordinator};
use crate::logs::buffer::{BufferLimits, LogBufferService};
use crate::logs::clock::LogClock;
use crate::logs::logger::Logger;
use crate::logs::transport::{LogTransport, StdoutTransport};

#[derive(Clone)]
pub struct Runtime {
    config: RuntimeConfig,
    env: Environment,
    clock: Clock,
    log_transport: Arc<dyn LogTransport>,
    emitter: Emitter,
    limits: BufferLimits,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.config)
            .field("limits", &self.limits)
            .field("emitter", &self.emitter)
            .finish_non_exhaustive()
    }
}

impl Runtime {
    #[must_use]
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::default()
    }

    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Cancelling this token aborts every running invocation.
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Runs an HTTP handler. Always produces a response.
    pub async fn handle_http(
        &self,
        record: &HttpRecord,
        request: HttpRequest,
    ) -> http::Response<Bytes> {
        let client = request.extensions().get::<ClientInfo>().cloned();
        let span = debug_span!(
            "invocation",
            trigger = "http",
            method = %request.method(),
            uri = %request.uri(),
        );

        self.invoke(
            &record.config,
            record.metadata.clone(),
            client,
            |log, parts| async move {
                invocation::http::invoke(&log, parts, record, request).await
            },
        )
        .instrument(span)
        .await
        .unwrap_or_else(|| {
            let aborted = ShapedResponse::empty(StatusCode::INTERNAL_SERVER_ERROR);
            finalize(aborted, &HeaderMap::new())
        })
    }

    pub async fn handle_timer(&self, record: &TimerRecord, fire: TimerFire) -> InvocationOutcome {
        let span = debug_span!("invocation", trigger = "timer", schedule = %fire.schedule);
        self.invoke(
            &record.config,
            record.metadata.clone(),
            None,
            |log, parts| async move { invocation::timer::invoke(&log, parts, record, fire).await },
        )
        .instrument(span)
        .await
        .unwrap_or(InvocationOutcome::Failed)
    }

    pub async fn handle_event(&self, record: &EventRecord, event: Event) -> InvocationOutcome {
        let span = debug_span!("invocation", trigger = "event", topic = %event.topic);
        self.invoke(
            &record.config,
            record.metadata.clone(),
            None,
            |log, parts| async move { invocation::event::invoke(&log, parts, record, event).await },
        )
        .instrument(span)
        .await
        .unwrap_or(InvocationOutcome::Failed)
    }

    /// Drives one invocation through its deadlines and final flush.
    ///
    /// Returns `None` when the handler was abandoned at the hard deadline.
    async fn invoke<T, F, Fut>(
        &self,
        config: &HandlerConfig,
        meta: Option<HandlerMetadata>,
        client: Option<ClientInfo>,
        wrapper: F,
    ) -> Option<T>
    where
        F: FnOnce(Logger, ContextParts) -> Fut,
        Fut: Future<Output = T>,
    {
        let outer = self.shutdown.child_token();
        let inner = outer.child_token();

        let buffer =
            LogBufferService::spawn(Arc::clone(&self.log_transport), outer.clone(), self.limits);
        let minimum_level = config.minimum_log_level.unwrap_or(self.config.log_level);
        let log = Logger::new(buffer.clone(), LogClock::new()).with_minimum_level(minimum_level);

        let timeout = self.config.effective_timeout(config.timeout);
        let mut timers = TimeoutCoordinator::start(
            timeout,
            self.config.flush_abort_grace,
            log.clone(),
            inner.clone(),
            outer.clone(),
        );

        let parts = ContextParts {
            env: self.env.clone(),
            clock: self.clock.clone(),
            signal: inner,
            emitter: self.emitter.clone(),
            success: SuccessCallbacks::default(),
            client,
            meta,
        };

        let outcome = tokio::select! {
            biased;
            outcome = wrapper(log.clone(), parts) => Some(outcome),
            () = outer.cancelled() => {
                warn!("Abandoning invocation after the flush abort deadline");
                None
            }
        };

        timers.clear_soft();
        let flushed = tokio::select! {
            biased;
            result = log.flush() => result,
            () = outer.cancelled() => Err(LogError::Aborted),
        };
        if let Err(e) = flushed {
            warn!("Function logs were not fully delivered: {e}");
        }
        timers.clear_hard();

        if buffer.shutdown().is_err() {
            debug!("Log buffer service already stopped");
        }
        outcome
    }
}

/// Builds a [`Runtime`]. Logs go to stdout unless a transport is given.
#[derive(Default)]
pub struct RuntimeBuilder {
    config: Option<RuntimeConfig>,
    env: Option<Environment>,
    clock: Option<Clock>,
    log_transport: Option<Arc<dyn LogTransport>>,
    event_transport: Option<Arc<dyn EventTransport>>,
    limits: Option<BufferLimits>,
    shutdown: Option<CancellationToken>,
}

impl RuntimeBuilder {
    #[must_use]
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = Some(config);
        self
    }

    #[must_use]
    pub fn env(mut self, env: Environment) -> Self {
        self.env = Some(env);
        self
    }

    #[must_use]
    pub fn clock(mut self, clock: Clock) -> Self {
        self.clock = Some(clock);
        self
    }

    #[must_use]
    pub fn log_transport(mut self, transport: Arc<dyn LogTransport>) -> Self {
        self.log_transport = Some(transport);
        self
    }

    #[must_use]
    pub fn event_transport(mut self, transport: Arc<dyn EventTransport>) -> Self {
        self.event_transport = Some(transport);
        self
    }

    #[must_use]
    pub fn buffer_limits(mut self, limits: BufferLimits) -> Self {
        self.limits = Some(limits);
        self
    }

    #[must_use]
    pub fn shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown = Some(token);
        self
    }

    #[must_use]
    pub fn build(self) -> Runtime {
        Runtime {
            config: self.config.unwrap_or_default(),
            env: self.env.unwrap_or_else(Environment::from_process),
            clock: self.clock.unwrap_or_default(),
            log_transport: self
                .log_transport
                .unwrap_or_else(|| Arc::new(StdoutTransport)),
            emitter: self
                .event_transport
                .map_or_else(Emitter::unavailable, Emitter::new),
            limits: self.limits.unwrap_or_default(),
            shutdown: self.shutdown.unwrap_or_default(),
        }
    }
}
