// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use bytes::Bytes;
use http::StatusCode;
use serde_json::{json, Value};

use crate::context::ContextParts;
use crate::handler::HttpRecord;
use crate::http::{finalize, shape_error, HttpRequest, ShapedResponse};
use crate::invocation::timing::ExecutionTimer;
use crate::invocation::{response_fields, tag, BEGIN, END};
use crate::logs::level::LogLevel;
use crate::logs::logger::Logger;
use crate::logs::serializer::ErrorValue;

/// Runs an HTTP handler and builds the response sent to the client.
///
/// The END line reports the final status, after conditional 304 handling.
/// Success callbacks run only when that status is not an error.
pub async fn invoke(
    log: &Logger,
    parts: ContextParts,
    record: &HttpRecord,
    request: HttpRequest,
) -> http::Response<Bytes> {
    let exclude_body = record.config.exclude_body_from_logs;
    let request_headers = request.headers().clone();
    let log = tag(
        log,
        record.metadata.as_ref(),
        "request",
        describe(&request, exclude_body),
    );
    let success = parts.success.clone();

    log.trace(BEGIN);
    let result = {
        let _timer = ExecutionTimer::start(&log);
        let ctx = parts.with_logger(log.clone());
        record.entry.call(ctx, request).await
    };

    match result {
        Ok(result) => {
            let shaped = result.shape(exclude_body).unwrap_or_else(|e| {
                log.error_with(
                    "Failed to convert handler result into a response",
                    ErrorValue::error(&e),
                );
                ShapedResponse::empty(StatusCode::INTERNAL_SERVER_ERROR)
            });
            let is_error = shaped.is_error();
            let log_body = shaped.log_body.clone();
            let response = finalize(shaped, &request_headers);

            let status = response.status();
            let level = if is_error {
                LogLevel::Warn
            } else {
                LogLevel::Debug
            };
            let log_body = log_body.filter(|_| status != StatusCode::NOT_MODIFIED);
            let fields = response_fields(status.as_u16(), log_body);
            log.log(level, END, None, Some(&fields));

            if is_error {
                success.discard();
            } else {
                success.run().await;
            }
            response
        }
        Err(error) => {
            log.log(LogLevel::Error, END, Some(&ErrorValue::from(&error)), None);
            success.discard();

            let shaped = shape_error(&error, exclude_body).unwrap_or_else(|e| {
                log.error_with(
                    "Failed to convert error into a response",
                    ErrorValue::error(&e),
                );
                ShapedResponse::empty(StatusCode::INTERNAL_SERVER_ERROR)
            });
            finalize(shaped, &request_headers)
        }
    }
}

fn describe(request: &HttpRequest, exclude_body: bool) -> Value {
    let mut descriptor = json!({
        "method": request.method().as_str(),
        "uri": request.uri().to_string(),
    });
    if !exclude_body {
        let body = loggable_body(request.body());
        if let (Some(body), Some(map)) = (body, descriptor.as_object_mut()) {
            map.insert("body".to_string(), body);
        }
    }
    descriptor
}

fn loggable_body(body: &Bytes) -> Option<Value> {
    if body.is_empty() {
        return None;
    }
    serde_json::from_slice(body).ok().or_else(|| {
        std::str::from_utf8(body)
            .ok()
            .map(|text| Value::String(text.to_string()))
    })
}
