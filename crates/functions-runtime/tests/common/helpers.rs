// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Helpers for building runtimes, records and requests

use bytes::Bytes;
use functions_runtime::context::Environment;
use functions_runtime::handler::{
    EventRecord, HandlerConfig, HandlerRecord, HttpRecord, HttpRoute, Schedule, Subscription,
    TimerRecord,
};
use functions_runtime::http::{HttpRequest, HttpResult};
use functions_runtime::logs::level::LogLevel;
use functions_runtime::{handler_fn, Context, Runtime, RuntimeConfig};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::mocks::MemoryTransport;

#[allow(dead_code)]
pub fn runtime(transport: &MemoryTransport) -> Runtime {
    runtime_with_config(transport, RuntimeConfig::default())
}

#[allow(dead_code)]
pub fn runtime_with_config(transport: &MemoryTransport, config: RuntimeConfig) -> Runtime {
    let env: Environment = [("REGION", "eu-west-1")].into_iter().collect();
    Runtime::builder()
        .config(config)
        .env(env)
        .log_transport(Arc::new(transport.clone()))
        .build()
}

#[allow(dead_code)]
pub fn trace_config() -> HandlerConfig {
    HandlerConfig {
        minimum_log_level: Some(LogLevel::Trace),
        ..HandlerConfig::default()
    }
}

#[allow(dead_code)]
pub fn timeout_config(timeout: Duration) -> HandlerConfig {
    HandlerConfig {
        timeout: Some(timeout),
        ..HandlerConfig::default()
    }
}

#[allow(dead_code)]
pub fn http_record<F, Fut>(config: HandlerConfig, f: F) -> HttpRecord
where
    F: Fn(Context, HttpRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<HttpResult>> + Send + 'static,
{
    HandlerRecord {
        metadata: None,
        config,
        trigger: HttpRoute {
            method: http::Method::GET,
            path: "/resource".to_string(),
        },
        entry: Arc::new(handler_fn(f)),
    }
}

#[allow(dead_code)]
pub fn timer_record<F, Fut>(config: HandlerConfig, f: F) -> TimerRecord
where
    F: Fn(Context, functions_runtime::handler::TimerFire) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    HandlerRecord {
        metadata: None,
        config,
        trigger: Schedule {
            cron: "0 * * * *".to_string(),
        },
        entry: Arc::new(handler_fn(f)),
    }
}

#[allow(dead_code)]
pub fn event_record<F, Fut>(config: HandlerConfig, f: F) -> EventRecord
where
    F: Fn(Context, functions_runtime::events::Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    HandlerRecord {
        metadata: None,
        config,
        trigger: Subscription {
            topic: "orders".to_string(),
            event_type: None,
        },
        entry: Arc::new(handler_fn(f)),
    }
}

#[allow(dead_code)]
pub fn get(headers: &[(&'static str, &str)]) -> HttpRequest {
    let mut builder = http::Request::builder()
        .method(http::Method::GET)
        .uri("/resource");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Bytes::new()).unwrap()
}
