// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Canonical JSON rendering of function log lines.
//!
//! A line is a single JSON object:
//!
//! ```json
//! {"timestamp":"2024-03-01T12:00:01.500250Z","level":"error","message":"END","error":{...},"meta":{...}}
//! ```
//!
//! Enrichment merges reserved fields first, then custom fields, then the
//! per-call fields, so the most specific source wins. `timestamp`, `level`,
//! `message` and `error` are written by the serializer and cannot be shadowed.
//!
//! Errors are classified into one of the [`ErrorValue`] variants and
//! normalized into JSON. Source chains are walked with ancestor tracking:
//! an error whose chain loops back onto itself is rendered as a
//! [`CircularStructure`] description instead of recursing forever.

use serde_json::{json, Value};
use std::backtrace::BacktraceStatus;
use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt;

use crate::error::AggregateError;
use crate::http::HttpError;
use crate::logs::enrichment::{Enrichment, Fields};
use crate::logs::level::LogLevel;

const CORE_KEYS: [&str; 4] = ["timestamp", "level", "message", "error"];

/// Ancestors are compared by address and vtable: a source stored at offset 0
/// of its parent is a different node. Vtables may be duplicated across
/// codegen units, so chains deeper than this are also reported as circular.
const MAX_CHAIN_DEPTH: usize = 64;

type Ancestors = Vec<*const (dyn StdError + 'static)>;

/// A thrown or reported value attached to a log line.
#[derive(Debug)]
pub enum ErrorValue<'a> {
    /// A bare string, number or boolean.
    Primitive(Primitive<'a>),
    /// A Rust error and its source chain.
    Structured(Structured<'a>),
    /// An arbitrary JSON value reported as the failure.
    Object(Cow<'a, Value>),
    /// Several failures reported together.
    Many(Vec<ErrorValue<'a>>),
}

#[derive(Debug)]
pub enum Primitive<'a> {
    Str(Cow<'a, str>),
    Number(f64),
    Bool(bool),
}

#[derive(Debug)]
pub enum Structured<'a> {
    Std {
        error: &'a (dyn StdError + 'static),
        name: &'static str,
    },
    Anyhow(&'a anyhow::Error),
}

impl<'a> ErrorValue<'a> {
    /// Wraps a typed error, naming it after its type.
    pub fn error<E: StdError + 'static>(error: &'a E) -> Self {
        ErrorValue::Structured(Structured::Std {
            error,
            name: short_type_name::<E>(),
        })
    }
}

impl<'a> From<&'a str> for ErrorValue<'a> {
    fn from(value: &'a str) -> Self {
        ErrorValue::Primitive(Primitive::Str(Cow::Borrowed(value)))
    }
}

impl From<String> for ErrorValue<'_> {
    fn from(value: String) -> Self {
        ErrorValue::Primitive(Primitive::Str(Cow::Owned(value)))
    }
}

impl From<f64> for ErrorValue<'_> {
    fn from(value: f64) -> Self {
        ErrorValue::Primitive(Primitive::Number(value))
    }
}

impl From<i64> for ErrorValue<'_> {
    fn from(value: i64) -> Self {
        ErrorValue::Primitive(Primitive::Number(value as f64))
    }
}

impl From<bool> for ErrorValue<'_> {
    fn from(value: bool) -> Self {
        ErrorValue::Primitive(Primitive::Bool(value))
    }
}

impl<'a> From<&'a anyhow::Error> for ErrorValue<'a> {
    fn from(value: &'a anyhow::Error) -> Self {
        ErrorValue::Structured(Structured::Anyhow(value))
    }
}

impl<'a> From<&'a (dyn StdError + 'static)> for ErrorValue<'a> {
    fn from(error: &'a (dyn StdError + 'static)) -> Self {
        ErrorValue::Structured(Structured::Std {
            error,
            name: known_name(error).unwrap_or("Error"),
        })
    }
}

impl From<Value> for ErrorValue<'_> {
    fn from(value: Value) -> Self {
        ErrorValue::Object(Cow::Owned(value))
    }
}

impl<'a> From<&'a Value> for ErrorValue<'a> {
    fn from(value: &'a Value) -> Self {
        ErrorValue::Object(Cow::Borrowed(value))
    }
}

impl<'a> From<Vec<ErrorValue<'a>>> for ErrorValue<'a> {
    fn from(values: Vec<ErrorValue<'a>>) -> Self {
        ErrorValue::Many(values)
    }
}

/// Raised when an error's source chain refers back to one of its ancestors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircularStructure {
    property: &'static str,
}

impl fmt::Display for CircularStructure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Converting circular structure to JSON: property '{}' closes the circle",
            self.property
        )
    }
}

impl std::error::Error for CircularStructure {}

/// Normalizes a reported value into JSON. `Ok(None)` means nothing to report.
pub fn normalize_error(value: &ErrorValue<'_>) -> Result<Option<Value>, CircularStructure> {
    let mut ancestors = Vec::new();
    normalize(value, "error", &mut ancestors)
}

fn normalize(
    value: &ErrorValue<'_>,
    property: &'static str,
    ancestors: &mut Ancestors,
) -> Result<Option<Value>, CircularStructure> {
    match value {
        ErrorValue::Primitive(Primitive::Str(text)) => Ok(Some(primitive(text, "string"))),
        ErrorValue::Primitive(Primitive::Number(number)) => {
            Ok(Some(primitive(&number.to_string(), "number")))
        }
        ErrorValue::Primitive(Primitive::Bool(flag)) => {
            Ok(Some(primitive(&flag.to_string(), "boolean")))
        }
        ErrorValue::Structured(Structured::Std { error, name }) => {
            normalize_std(*error, name, None, property, ancestors).map(Some)
        }
        ErrorValue::Structured(Structured::Anyhow(error)) => {
            normalize_anyhow(error, property, ancestors).map(Some)
        }
        ErrorValue::Object(value) => Ok(normalize_json(value)),
        ErrorValue::Many(values) => {
            let mut items = Vec::with_capacity(values.len());
            for value in values {
                items.push(normalize(value, property, ancestors)?.unwrap_or(Value::Null));
            }
            Ok(Some(Value::Array(items)))
        }
    }
}

fn primitive(message: &str, name: &str) -> Value {
    json!({ "message": message, "name": name })
}

fn normalize_json(value: &Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(primitive(text, "string")),
        Value::Number(number) => Some(primitive(&number.to_string(), "number")),
        Value::Bool(flag) => Some(primitive(&flag.to_string(), "boolean")),
        Value::Array(items) => Some(Value::Array(
            items
                .iter()
                .map(|item| normalize_json(item).unwrap_or(Value::Null))
                .collect(),
        )),
        Value::Object(map) => Some(Value::Object(map.clone())),
    }
}

fn normalize_anyhow(
    error: &anyhow::Error,
    property: &'static str,
    ancestors: &mut Ancestors,
) -> Result<Value, CircularStructure> {
    let inner: &(dyn StdError + 'static) = error.as_ref();
    let name = known_name(inner)
        .or_else(|| error.is::<HttpError>().then_some("HttpError"))
        .or_else(|| error.is::<AggregateError>().then_some("AggregateError"))
        .unwrap_or("Error");
    let backtrace = error.backtrace();
    let stack = (backtrace.status() == BacktraceStatus::Captured).then(|| backtrace.to_string());
    normalize_std(inner, name, stack, property, ancestors)
}

fn normalize_std(
    error: &(dyn StdError + 'static),
    name: &str,
    stack: Option<String>,
    property: &'static str,
    ancestors: &mut Ancestors,
) -> Result<Value, CircularStructure> {
    let identity = error as *const (dyn StdError + 'static);
    let closes_circle = ancestors
        .iter()
        .any(|ancestor| std::ptr::eq(*ancestor, identity));
    if closes_circle || ancestors.len() >= MAX_CHAIN_DEPTH {
        return Err(CircularStructure { property });
    }
    ancestors.push(identity);
    let normalized = structured_fields(error, name, stack, ancestors);
    ancestors.pop();
    normalized
}

fn structured_fields(
    error: &(dyn StdError + 'static),
    name: &str,
    stack: Option<String>,
    ancestors: &mut Ancestors,
) -> Result<Value, CircularStructure> {
    let mut map = Fields::new();
    map.insert("message".to_string(), Value::String(error.to_string()));
    map.insert("name".to_string(), Value::String(name.to_string()));

    if let Some(http) = error.downcast_ref::<HttpError>() {
        map.insert("status_code".to_string(), Value::from(http.status));
    }
    if let Some(aggregate) = error.downcast_ref::<AggregateError>() {
        let mut errors = Vec::with_capacity(aggregate.errors.len());
        for member in &aggregate.errors {
            errors.push(normalize_anyhow(member, "errors", ancestors)?);
        }
        map.insert("errors".to_string(), Value::Array(errors));
    }
    if let Some(stack) = stack {
        map.insert("stack".to_string(), Value::String(stack));
    }
    if let Some(source) = error.source() {
        let source_name = known_name(source).unwrap_or("Error");
        let cause = normalize_std(source, source_name, None, "cause", ancestors)?;
        map.insert("cause".to_string(), cause);
    }
    Ok(Value::Object(map))
}

fn known_name(error: &(dyn StdError + 'static)) -> Option<&'static str> {
    if error.is::<HttpError>() {
        Some("HttpError")
    } else if error.is::<AggregateError>() {
        Some("AggregateError")
    } else if error.is::<CircularStructure>() {
        Some("CircularStructure")
    } else {
        None
    }
}

fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// A rendered log line plus the normalized error kept on the entry.
#[derive(Debug, Clone, PartialEq)]
pub struct SerializedEntry {
    pub json: String,
    pub error: Option<Value>,
}

pub fn serialize_entry(
    timestamp: &str,
    level: LogLevel,
    message: &str,
    error: Option<&ErrorValue<'_>>,
    fields: Option<&Fields>,
    reserved: &Enrichment,
    custom: &Enrichment,
) -> SerializedEntry {
    let error = match error.map(normalize_error) {
        None | Some(Ok(None)) => None,
        Some(Ok(Some(normalized))) => Some(normalized),
        Some(Err(circular)) => Some(json!({
            "message": circular.to_string(),
            "name": "CircularStructure",
        })),
    };

    let mut extra = Fields::new();
    reserved.merge_into(&mut extra);
    custom.merge_into(&mut extra);
    if let Some(fields) = fields {
        for (key, value) in fields {
            extra.insert(key.clone(), value.clone());
        }
    }

    let mut line = Fields::new();
    line.insert("timestamp".into(), timestamp.into());
    line.insert("level".into(), level.as_str().into());
    line.insert("message".into(), message.into());
    if let Some(error) = &error {
        line.insert("error".to_string(), error.clone());
    }
    for (key, value) in extra {
        if !CORE_KEYS.contains(&key.as_str()) {
            line.insert(key, value);
        }
    }

    let json = serde_json::to_string(&line).unwrap_or_else(|e| {
        json!({
            "timestamp": timestamp,
            "level": level.as_str(),
            "message": message,
            "error": { "message": e.to_string(), "name": "SerializationError" },
        })
        .to_string()
    });

    SerializedEntry { json, error }
}
