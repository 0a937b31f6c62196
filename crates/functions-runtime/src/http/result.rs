// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, StatusCode};
use serde_json::Value;
use std::fmt;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const OCTET_STREAM: &str = "application/octet-stream";
const APPLICATION_JSON: &str = "application/json";

/// Response body returned by a handler.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Text(String),
    Binary(Bytes),
    Json(Value),
}

impl Body {
    /// Content type used when the handler declared none.
    #[must_use]
    pub fn content_type(&self) -> &'static str {
        match self {
            Body::Text(_) => TEXT_PLAIN,
            Body::Binary(_) => OCTET_STREAM,
            Body::Json(_) => APPLICATION_JSON,
        }
    }

    /// The body as it may appear in a log line. Binary bodies never do.
    #[must_use]
    pub fn loggable(&self) -> Option<Value> {
        match self {
            Body::Text(text) => Some(Value::String(text.clone())),
            Body::Binary(_) => None,
            Body::Json(value) => Some(value.clone()),
        }
    }

    fn into_bytes(self) -> Result<Bytes, ShapeError> {
        match self {
            Body::Text(text) => Ok(Bytes::from(text)),
            Body::Binary(bytes) => Ok(bytes),
            Body::Json(value) => Ok(Bytes::from(serde_json::to_vec(&value)?)),
        }
    }
}

/// Status, headers and body of a handler response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseParts {
    /// Defaults to 200.
    pub status: Option<u16>,
    pub headers: HeaderMap,
    pub body: Option<Body>,
}

impl ResponseParts {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.body = Some(Body::Text(text.into()));
        self
    }

    #[must_use]
    pub fn json(mut self, value: Value) -> Self {
        self.body = Some(Body::Json(value));
        self
    }

    #[must_use]
    pub fn binary(mut self, bytes: impl Into<Bytes>) -> Self {
        self.body = Some(Body::Binary(bytes.into()));
        self
    }
}

/// What an HTTP handler returns on success.
#[derive(Debug, Clone, PartialEq)]
pub enum HttpResult {
    /// 204 with no body.
    NoContent,
    /// 200 `text/plain`.
    Text(String),
    Parts(ResponseParts),
}

impl From<()> for HttpResult {
    fn from((): ()) -> Self {
        HttpResult::NoContent
    }
}

impl From<String> for HttpResult {
    fn from(text: String) -> Self {
        HttpResult::Text(text)
    }
}

impl From<&str> for HttpResult {
    fn from(text: &str) -> Self {
        HttpResult::Text(text.to_string())
    }
}

impl From<ResponseParts> for HttpResult {
    fn from(parts: ResponseParts) -> Self {
        HttpResult::Parts(parts)
    }
}

impl From<Value> for HttpResult {
    fn from(value: Value) -> Self {
        HttpResult::Parts(ResponseParts::new().json(value))
    }
}

impl HttpResult {
    /// Maps the handler's result to a response.
    ///
    /// # Errors
    ///
    /// Fails on a status outside 100..=999 or a JSON body that cannot be
    /// encoded.
    pub fn shape(self, exclude_body_from_logs: bool) -> Result<ShapedResponse, ShapeError> {
        match self {
            HttpResult::NoContent => Ok(ShapedResponse::empty(StatusCode::NO_CONTENT)),
            HttpResult::Text(text) => shape(
                StatusCode::OK.as_u16(),
                HeaderMap::new(),
                Some(Body::Text(text)),
                exclude_body_from_logs,
            ),
            HttpResult::Parts(parts) => shape(
                parts.status.unwrap_or(StatusCode::OK.as_u16()),
                parts.headers,
                parts.body,
                exclude_body_from_logs,
            ),
        }
    }
}

/// Error a handler can return to choose its error response.
///
/// Any other error becomes a bare 500.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpError {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Option<Body>,
}

impl HttpError {
    #[must_use]
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.body = Some(Body::Text(text.into()));
        self
    }

    #[must_use]
    pub fn with_json(mut self, value: Value) -> Self {
        self.body = Some(Body::Json(value));
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.body {
            Some(Body::Text(text)) => write!(f, "HTTP {}: {text}", self.status),
            _ => write!(f, "HTTP {}", self.status),
        }
    }
}

impl std::error::Error for HttpError {}

/// Converts an error returned by a handler into its response.
///
/// # Errors
///
/// Fails when an [`HttpError`] carries an invalid status or body.
pub fn shape_error(
    error: &anyhow::Error,
    exclude_body_from_logs: bool,
) -> Result<ShapedResponse, ShapeError> {
    match error.downcast_ref::<HttpError>() {
        Some(http) => shape(
            http.status,
            http.headers.clone(),
            http.body.clone(),
            exclude_body_from_logs,
        ),
        None => Ok(ShapedResponse::empty(StatusCode::INTERNAL_SERVER_ERROR)),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ShapeError {
    #[error("Invalid response status: {0}")]
    InvalidStatus(u16),

    #[error("Failed to encode JSON response body: {0}")]
    Body(#[from] serde_json::Error),
}

/// A response ready for [`crate::http::finalize`].
#[derive(Debug, Clone, PartialEq)]
pub struct ShapedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Body as it appears on the END log line.
    pub log_body: Option<Value>,
}

impl ShapedResponse {
    #[must_use]
    pub fn empty(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            log_body: None,
        }
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.status.is_client_error() || self.status.is_server_error()
    }
}

fn shape(
    status: u16,
    mut headers: HeaderMap,
    body: Option<Body>,
    exclude_body_from_logs: bool,
) -> Result<ShapedResponse, ShapeError> {
    let status = StatusCode::from_u16(status).map_err(|_| ShapeError::InvalidStatus(status))?;
    let Some(body) = body else {
        return Ok(ShapedResponse {
            status,
            headers,
            body: Bytes::new(),
            log_body: None,
        });
    };

    if !headers.contains_key(CONTENT_TYPE) {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(body.content_type()));
    }
    let log_body = if exclude_body_from_logs {
        None
    } else {
        body.loggable()
    };

    Ok(ShapedResponse {
        status,
        headers,
        body: body.into_bytes()?,
        log_body,
    })
}
