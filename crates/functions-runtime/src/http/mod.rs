// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! HTTP result mapping and response finalization.

mod response;
mod result;

pub use response::{etag, finalize, COMPRESSION_THRESHOLD_BYTES};
pub use result::{
    shape_error, Body, HttpError, HttpResult, ResponseParts, ShapeError, ShapedResponse,
};

/// Request type handed to HTTP handlers.
pub type HttpRequest = http::Request<bytes::Bytes>;
