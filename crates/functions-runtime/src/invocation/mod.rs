// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Invocation wrappers.
//!
//! Each trigger kind gets a wrapper that tags the logger with what is being
//! handled, logs BEGIN and END around the handler call, times it and decides
//! whether the deferred success callbacks run. The wrappers never fail: every
//! handler error is logged and turned into an outcome the host can act on.

pub mod event;
pub mod http;
pub mod timeout;
pub mod timer;
mod timing;

use serde_json::{json, Value};

use crate::context::SuccessCallbacks;
use crate::handler::HandlerMetadata;
use crate::logs::enrichment::{fields, Fields};
use crate::logs::logger::Logger;

pub use timeout::TimeoutCoordinator;

/// Result of a timer or event invocation, for hosts that ack or nack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationOutcome {
    Succeeded,
    Failed,
}

impl InvocationOutcome {
    #[must_use]
    pub fn is_success(self) -> bool {
        self == InvocationOutcome::Succeeded
    }
}

const BEGIN: &str = "BEGIN";
const END: &str = "END";

/// Attaches handler metadata and the trigger descriptor to `log`.
fn tag(
    log: &Logger,
    meta: Option<&HandlerMetadata>,
    trigger: &'static str,
    descriptor: Value,
) -> Logger {
    let log = match meta.map(serde_json::to_value) {
        Some(Ok(meta)) => log.enrich_reserved([("meta", meta)]),
        _ => log.clone(),
    };
    log.enrich_reserved([(trigger, descriptor)])
}

fn response_fields(status: u16, body: Option<Value>) -> Fields {
    let mut response = json!({ "status": status });
    if let (Some(body), Some(map)) = (body, response.as_object_mut()) {
        map.insert("body".to_string(), body);
    }
    fields([("response", response)])
}

/// END line and success callbacks for triggers without a response.
async fn settle(
    log: &Logger,
    success: &SuccessCallbacks,
    result: anyhow::Result<()>,
) -> InvocationOutcome {
    match result {
        Ok(()) => {
            log.debug(END);
            success.run().await;
            InvocationOutcome::Succeeded
        }
        Err(error) => {
            log.error_with(END, &error);
            success.discard();
            InvocationOutcome::Failed
        }
    }
}
