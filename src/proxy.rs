//! Forwarding of SPA requests to the upstream pet-care API.
//!
//! # Flow
//!
//! ```text
//! /pets/3?full=1 ──match prefix──► /pets ──rewrite──► /pets/3?full=1
//!                                                          │
//!                         UPSTREAM_URL (…/api) + path ◄────┘
//!                                   │
//!                            UpstreamClient::forward
//!                       ┌───────────┴────────────┐
//!                   Ok(response)            Err(error)
//!                 relay status, headers,   upstream status or 502,
//!                 body (JSON or bytes)     upstream body or
//!                                          {"error":"Bad gateway"}
//! ```
//!
//! Dropping the handler future (client disconnect) drops the in-flight
//! upstream request with it.

use std::time::Instant;

use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::extract::rejection::BytesRejection;
use axum::http::header::{ACCEPT, CONTENT_LENGTH, CONTENT_TYPE, HeaderName, TRANSFER_ENCODING};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde_json::json;
use tracing::{debug, error};

use crate::error::{AppError, AppResult, NOT_FOUND_MESSAGE};
use crate::metrics;
use crate::middleware::REQUEST_ID_HEADER;
use crate::state::AppState;
use crate::upstream::{
    ResponseKind, UpstreamBody, UpstreamError, UpstreamRequest, UpstreamResponse,
};

/// Body sent when the upstream could not be reached or sent no error body.
pub const BAD_GATEWAY_MESSAGE: &str = "Bad gateway";

/// Request headers passed on to the upstream API.
const FORWARDED_HEADERS: [&str; 5] = [
    "content-type",
    "accept",
    "accept-language",
    "authorization",
    REQUEST_ID_HEADER,
];

/// The configured prefix a path falls under: the prefix itself or anything below it.
pub fn match_prefix<'a>(path: &str, prefixes: &'a [String]) -> Option<&'a str> {
    prefixes
        .iter()
        .map(String::as_str)
        .filter(|prefix| {
            path.strip_prefix(prefix)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
        })
        .max_by_key(|prefix| prefix.len())
}

/// Replace `prefix` at the start of `path` with `replacement`.
///
/// Paths not starting with `prefix` are returned unchanged.
pub fn rewrite_path(path: &str, prefix: &str, replacement: &str) -> String {
    match path.strip_prefix(prefix) {
        Some(rest) => format!("{replacement}{rest}"),
        None => path.to_string(),
    }
}

/// Whether the method forwards a request body.
fn forwards_body(method: &Method) -> bool {
    !(method == Method::GET || method == Method::HEAD)
}

fn forwarded_headers(headers: &HeaderMap) -> HeaderMap {
    let mut forwarded = HeaderMap::new();
    for name in FORWARDED_HEADERS {
        for value in headers.get_all(name) {
            forwarded.append(HeaderName::from_static(name), value.clone());
        }
    }
    forwarded
}

/// Build the upstream request for an inbound request under `prefix`.
pub fn upstream_request(
    state: &AppState,
    prefix: &str,
    method: Method,
    uri: &Uri,
    headers: &HeaderMap,
    body: Bytes,
) -> UpstreamRequest {
    let mut path_and_query = rewrite_path(uri.path(), prefix, state.config.rewrite_for(prefix));
    if let Some(query) = uri.query() {
        path_and_query.push('?');
        path_and_query.push_str(query);
    }

    let body = forwards_body(&method).then_some(body);

    UpstreamRequest {
        method,
        path_and_query,
        headers: forwarded_headers(headers),
        body,
        kind: ResponseKind::from_accept(headers.get(ACCEPT)),
    }
}

/// Proxy handler mounted under every configured prefix.
pub async fn forward(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> AppResult<Response> {
    let body = body?;
    let prefix = match_prefix(uri.path(), &state.config.proxy_prefixes)
        .ok_or_else(|| AppError::NotFound(NOT_FOUND_MESSAGE.to_string()))?
        .to_string();

    let request = upstream_request(&state, &prefix, method, &uri, &headers, body);
    let method_label = request.method.to_string();

    let started = Instant::now();
    let outcome = state.upstream.forward(request).await;
    let elapsed = started.elapsed().as_secs_f64();
    state.stats.record_proxied();

    let response = match outcome {
        Ok(upstream) => {
            metrics::record_upstream_duration(&prefix, elapsed);
            relay(upstream)?
        }
        Err(err) => {
            state.stats.record_upstream_failure();
            metrics::record_upstream_failure(&prefix, err.kind());
            failure_response(err)
        }
    };

    metrics::record_proxied_request(&prefix, &method_label, response.status().as_str());
    Ok(response)
}

/// Turn a successful upstream response into the client response.
///
/// Copies every header except `transfer-encoding`. JSON bodies are
/// re-serialized, so their `content-length` is dropped and recomputed.
pub fn relay(upstream: UpstreamResponse) -> AppResult<Response> {
    let UpstreamResponse {
        status,
        headers,
        body,
    } = upstream;

    let reencoded = matches!(body, UpstreamBody::Json(_));
    let body = match body {
        UpstreamBody::Empty => Body::empty(),
        UpstreamBody::Bytes(raw) => Body::from(raw),
        UpstreamBody::Json(value) => {
            let encoded = serde_json::to_vec(&value)?;
            debug!(status = status.as_u16(), "Proxy request succeeded");
            Body::from(encoded)
        }
    };

    let mut response = Response::new(body);
    *response.status_mut() = status;

    let relayed = response.headers_mut();
    for (name, value) in headers.iter() {
        if name == TRANSFER_ENCODING || (reencoded && name == CONTENT_LENGTH) {
            continue;
        }
        relayed.append(name.clone(), value.clone());
    }

    Ok(response)
}

/// Respond to a failed upstream call. Never fails itself.
///
/// Raw error bodies keep the upstream `content-type`, falling back to
/// `application/octet-stream` when the upstream sent none.
pub fn failure_response(err: UpstreamError) -> Response {
    let upstream_status = err.status();
    error!(
        upstream_status = upstream_status.map(|s| s.as_u16()),
        error = %err,
        "Proxy request failed"
    );

    let status = upstream_status.unwrap_or(StatusCode::BAD_GATEWAY);
    match err.into_parts() {
        Some((_, UpstreamBody::Json(value))) => (status, Json(value)).into_response(),
        Some((headers, UpstreamBody::Bytes(raw))) => {
            let content_type = headers
                .get(CONTENT_TYPE)
                .cloned()
                .unwrap_or_else(|| HeaderValue::from_static("application/octet-stream"));
            (status, [(CONTENT_TYPE, content_type)], raw).into_response()
        }
        Some((_, UpstreamBody::Empty)) | None => {
            (status, Json(json!({ "error": BAD_GATEWAY_MESSAGE }))).into_response()
        }
    }
}
