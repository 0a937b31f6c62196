// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use bytes::Bytes;
use http::header::{ACCEPT_ENCODING, CONTENT_ENCODING, ETAG, IF_NONE_MATCH, VARY};
use http::{HeaderMap, HeaderValue, StatusCode};
use sha2::{Digest, Sha256};
use std::io::Write;
use tracing::{debug, warn};

use crate::http::result::ShapedResponse;

/// Bodies smaller than this are never compressed.
pub const COMPRESSION_THRESHOLD_BYTES: usize = 32_768;

const BROTLI_BUFFER_SIZE: usize = 4096;
const BROTLI_QUALITY: u32 = 5;
const BROTLI_LG_WINDOW: u32 = 22;

/// Strong validator for `body`: the quoted URL-safe base64 of its SHA-256.
#[must_use]
pub fn etag(body: &[u8]) -> String {
    format!("\"{}\"", URL_SAFE_NO_PAD.encode(Sha256::digest(body)))
}

/// Builds the final response: ETag and conditional 304 for successful
/// bodies, brotli when the client accepts it and the body is large enough.
#[must_use]
pub fn finalize(shaped: ShapedResponse, request_headers: &HeaderMap) -> http::Response<Bytes> {
    let ShapedResponse {
        mut status,
        mut headers,
        mut body,
        ..
    } = shaped;

    if status == StatusCode::OK && !body.is_empty() {
        let tag = etag(&body);
        if let Ok(value) = HeaderValue::from_str(&tag) {
            headers.insert(ETAG, value);
        }
        if matches_if_none_match(request_headers, &tag) {
            debug!("Response matches If-None-Match, sending 304");
            status = StatusCode::NOT_MODIFIED;
            body = Bytes::new();
        }
    }

    if body.len() >= COMPRESSION_THRESHOLD_BYTES && accepts_brotli(request_headers) {
        match compress(&body) {
            Ok(compressed) => {
                headers.insert(CONTENT_ENCODING, HeaderValue::from_static("br"));
                headers.append(VARY, HeaderValue::from_static("accept-encoding"));
                body = compressed;
            }
            Err(e) => warn!("Failed to compress response body, sending it uncompressed: {e}"),
        }
    }

    let mut response = http::Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

fn matches_if_none_match(request_headers: &HeaderMap, tag: &str) -> bool {
    request_headers
        .get_all(IF_NONE_MATCH)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .any(|candidate| candidate == "*" || candidate.trim_start_matches("W/") == tag)
}

fn accepts_brotli(request_headers: &HeaderMap) -> bool {
    request_headers
        .get_all(ACCEPT_ENCODING)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|coding| {
            let mut params = coding.split(';').map(str::trim);
            let name = params.next().unwrap_or_default();
            let quality = params
                .find_map(|param| param.strip_prefix("q="))
                .and_then(|q| q.parse::<f32>().ok())
                .unwrap_or(1.0);
            (name.eq_ignore_ascii_case("br") || name == "*") && quality > 0.0
        })
}

fn compress(body: &[u8]) -> std::io::Result<Bytes> {
    let mut out = Vec::with_capacity(body.len() / 2);
    {
        let mut writer = brotli::CompressorWriter::new(
            &mut out,
            BROTLI_BUFFER_SIZE,
            BROTLI_QUALITY,
            BROTLI_LG_WINDOW,
        );
        writer.write_all(body)?;
        writer.flush()?;
    }
    Ok(Bytes::from(out))
}
