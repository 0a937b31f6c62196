// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Per-invocation context handed to handlers.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::SystemTime;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::EmitError;
use crate::events::{Emitter, Event};
use crate::handler::HandlerMetadata;
use crate::logs::logger::Logger;

/// Read-only snapshot of environment variables exposed to handlers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment(Arc<HashMap<String, String>>);

impl Environment {
    #[must_use]
    pub fn from_process() -> Self {
        std::env::vars().collect()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn vars(&self) -> &HashMap<String, String> {
        &self.0
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Environment {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let vars = iter
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self(Arc::new(vars))
    }
}

/// Wall-clock source, injectable so tests can pin `now`.
#[derive(Clone)]
pub struct Clock(Arc<dyn Fn() -> SystemTime + Send + Sync>);

impl Clock {
    #[must_use]
    pub fn system() -> Self {
        Self(Arc::new(SystemTime::now))
    }

    #[must_use]
    pub fn fixed(at: SystemTime) -> Self {
        Self(Arc::new(move || at))
    }

    #[must_use]
    pub fn now(&self) -> SystemTime {
        (self.0)()
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::system()
    }
}

impl fmt::Debug for Clock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Clock")
    }
}

/// Caller identity supplied by the host, e.g. from an authenticated request.
///
/// HTTP hosts attach it to the request's extensions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClientInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
}

type Callback = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Work deferred until the invocation is known to have succeeded.
#[derive(Clone, Default)]
pub struct SuccessCallbacks(Arc<Mutex<Vec<Callback>>>);

impl SuccessCallbacks {
    pub fn push<F>(&self, callback: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::pin(callback));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs registered callbacks in registration order.
    pub async fn run(&self) {
        let callbacks = std::mem::take(&mut *self.0.lock().unwrap_or_else(PoisonError::into_inner));
        for callback in callbacks {
            callback.await;
        }
    }

    pub fn discard(&self) {
        let dropped = std::mem::take(&mut *self.0.lock().unwrap_or_else(PoisonError::into_inner));
        if !dropped.is_empty() {
            debug!("Discarding {} success callbacks", dropped.len());
        }
    }
}

impl fmt::Debug for SuccessCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SuccessCallbacks")
            .field(&self.len())
            .finish()
    }
}

/// Everything a [`Context`] holds except its logger.
#[derive(Debug, Clone)]
pub struct ContextParts {
    pub env: Environment,
    pub clock: Clock,
    /// Inner cancellation signal of the invocation.
    pub signal: CancellationToken,
    pub emitter: Emitter,
    pub success: SuccessCallbacks,
    pub client: Option<ClientInfo>,
    pub meta: Option<HandlerMetadata>,
}

impl ContextParts {
    #[must_use]
    pub fn with_logger(self, log: Logger) -> Context {
        Context {
            log,
            env: self.env,
            clock: self.clock,
            signal: self.signal,
            emitter: self.emitter,
            success: self.success,
            client: self.client,
            meta: self.meta,
        }
    }
}

/// What a handler sees of its invocation.
#[derive(Debug, Clone)]
pub struct Context {
    pub log: Logger,
    pub env: Environment,
    pub clock: Clock,
    pub signal: CancellationToken,
    pub client: Option<ClientInfo>,
    pub meta: Option<HandlerMetadata>,
    emitter: Emitter,
    success: SuccessCallbacks,
}

impl Context {
    /// Publishes an event, giving up when the invocation is cancelled.
    pub async fn emit(&self, event: Event) -> Result<(), EmitError> {
        self.emitter.emit(event, &self.signal).await
    }

    /// Defers `callback` until the invocation succeeds.
    pub fn on_success<F>(&self, callback: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.success.push(callback);
    }

    #[must_use]
    pub fn now(&self) -> SystemTime {
        self.clock.now()
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.signal.is_cancelled()
    }
}
