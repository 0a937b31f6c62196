// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use chrono::SecondsFormat;
use serde_json::json;

use crate::context::ContextParts;
use crate::handler::{TimerFire, TimerRecord};
use crate::invocation::timing::ExecutionTimer;
use crate::invocation::{settle, tag, InvocationOutcome, BEGIN};
use crate::logs::logger::Logger;

/// Runs a timer handler for one firing of its schedule.
pub async fn invoke(
    log: &Logger,
    parts: ContextParts,
    record: &TimerRecord,
    fire: TimerFire,
) -> InvocationOutcome {
    let log = tag(
        log,
        record.metadata.as_ref(),
        "timer",
        json!({
            "schedule": fire.schedule,
            "trigger_time": fire.trigger_time.to_rfc3339_opts(SecondsFormat::Millis, true),
        }),
    );
    let success = parts.success.clone();

    log.trace(BEGIN);
    let result = {
        let _timer = ExecutionTimer::start(&log);
        let ctx = parts.with_logger(log.clone());
        record.entry.call(ctx, fire).await
    };
    settle(&log, &success, result).await
}
