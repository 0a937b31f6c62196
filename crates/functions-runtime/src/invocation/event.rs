// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use serde_json::json;

use crate::context::ContextParts;
use crate::events::Event;
use crate::handler::EventRecord;
use crate::invocation::timing::ExecutionTimer;
use crate::invocation::{settle, tag, InvocationOutcome, BEGIN};
use crate::logs::logger::Logger;

/// Runs an event handler for one delivery.
///
/// Unlike HTTP, success callbacks run whenever the handler returns `Ok`.
pub async fn invoke(
    log: &Logger,
    parts: ContextParts,
    record: &EventRecord,
    event: Event,
) -> InvocationOutcome {
    let log = tag(
        log,
        record.metadata.as_ref(),
        "event",
        json!({
            "topic": event.topic,
            "type": event.event_type,
            "subject": event.subject,
            "message_id": event.message_id,
        }),
    );
    let success = parts.success.clone();

    log.trace(BEGIN);
    let result = {
        let _timer = ExecutionTimer::start(&log);
        let ctx = parts.with_logger(log.clone());
        record.entry.call(ctx, event).await
    };
    settle(&log, &success, result).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Clock, Context, Environment, SuccessCallbacks};
    use crate::events::Emitter;
    use crate::handler::{handler_fn, HandlerConfig, HandlerMetadata, HandlerRecord, Subscription};
    use crate::logs::buffer::{BufferCommand, LogBufferHandle};
    use crate::logs::clock::LogClock;
    use crate::logs::level::LogLevel;
    use serde_json::Value;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn test_event_descriptor_and_metadata_are_reserved() {
        let (handle, mut rx) = LogBufferHandle::detached();
        let log = Logger::new(handle, LogClock::new()).with_minimum_level(LogLevel::Trace);
        let record: EventRecord = HandlerRecord {
            metadata: Some(HandlerMetadata {
                package_name: "shop".to_string(),
                file_name: "orders.rs".to_string(),
                revision: None,
            }),
            config: HandlerConfig::default(),
            trigger: Subscription {
                topic: "orders".to_string(),
                event_type: None,
            },
            entry: Arc::new(handler_fn(|ctx: Context, event: Event| async move {
                ctx.log
                    .enrich([("order", event.subject.clone())])
                    .info("processing");
                anyhow::Ok(())
            })),
        };
        let parts = ContextParts {
            env: Environment::default(),
            clock: Clock::system(),
            signal: CancellationToken::new(),
            emitter: Emitter::unavailable(),
            success: SuccessCallbacks::default(),
            client: None,
            meta: record.metadata.clone(),
        };

        let event = Event::new("orders", "created", "order/9").with_message_id("m-9");
        let outcome = invoke(&log, parts, &record, event).await;
        assert!(outcome.is_success());

        let mut lines = Vec::new();
        while let Ok(BufferCommand::Collect(entry)) = rx.try_recv() {
            lines.push(serde_json::from_str::<Value>(&entry.json).unwrap());
        }
        let processing = lines.iter().find(|l| l["message"] == "processing").unwrap();
        assert_eq!(processing["order"], "order/9");
        assert_eq!(processing["meta"]["package_name"], "shop");
        assert_eq!(
            processing["event"],
            json!({
                "topic": "orders",
                "type": "created",
                "subject": "order/9",
                "message_id": "m-9",
            })
        );
        assert_eq!(lines.first().unwrap()["message"], "BEGIN");
        assert_eq!(lines.last().unwrap()["message"], "END");
    }
}
