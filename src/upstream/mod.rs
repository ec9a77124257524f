//! Upstream pet-care API client.
//!
//! The proxy talks to the upstream API only through [`UpstreamClient`], so the
//! real HTTP client ([`HttpUpstream`]) can be replaced by a fake in tests.
//!
//! # Failure Semantics
//!
//! Like the browser-side HTTP clients the SPA was written against, an upstream
//! response with status 400 or above is returned as
//! [`UpstreamError::Status`], carrying the headers and decoded body so the
//! proxy can relay them. Connection failures and timeouts carry no response at
//! all.

mod http;

use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use bytes::Bytes;
use serde_json::Value;
use thiserror::Error;

pub use self::http::HttpUpstream;

/// How the caller wants the upstream body handed back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    /// Decode as JSON; bodies that are not JSON fall back to raw bytes.
    Json,
    /// Keep the raw bytes.
    Binary,
}

impl ResponseKind {
    /// `Binary` when the client's `Accept` header asks for a PDF.
    pub fn from_accept(accept: Option<&HeaderValue>) -> Self {
        let wants_pdf = accept
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.to_ascii_lowercase().contains("application/pdf"));

        if wants_pdf {
            ResponseKind::Binary
        } else {
            ResponseKind::Json
        }
    }
}

/// Upstream response body.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamBody {
    Empty,
    Json(Value),
    Bytes(Bytes),
}

impl UpstreamBody {
    /// Decode raw bytes according to the requested kind.
    pub fn decode(raw: Bytes, kind: ResponseKind) -> Self {
        if raw.is_empty() {
            return UpstreamBody::Empty;
        }

        match kind {
            ResponseKind::Binary => UpstreamBody::Bytes(raw),
            ResponseKind::Json => match serde_json::from_slice(&raw) {
                Ok(value) => UpstreamBody::Json(value),
                Err(_) => UpstreamBody::Bytes(raw),
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, UpstreamBody::Empty)
    }
}

/// One request to forward.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub method: Method,
    /// Path and query appended to the upstream base URL, e.g. `/pets/3?full=1`.
    pub path_and_query: String,
    pub headers: HeaderMap,
    /// `None` for methods that never carry a body.
    pub body: Option<Bytes>,
    pub kind: ResponseKind,
}

/// A successful (status below 400) upstream response.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: UpstreamBody,
}

/// Errors raised while forwarding to the upstream API.
#[derive(Error, Debug, Clone)]
pub enum UpstreamError {
    /// The upstream answered with a failure status.
    #[error("upstream responded with status {status}")]
    Status {
        status: StatusCode,
        headers: HeaderMap,
        body: UpstreamBody,
    },

    #[error("upstream request timed out: {0}")]
    Timeout(String),

    #[error("upstream request failed: {0}")]
    Transport(String),

    #[error("invalid upstream request: {0}")]
    InvalidRequest(String),
}

impl UpstreamError {
    /// Status reported by the upstream, if it answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            UpstreamError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            UpstreamError::Status { .. } => "status",
            UpstreamError::Timeout(_) => "timeout",
            UpstreamError::Transport(_) => "transport",
            UpstreamError::InvalidRequest(_) => "invalid_request",
        }
    }

    /// Headers and body reported by the upstream, if it sent a body.
    pub fn into_parts(self) -> Option<(HeaderMap, UpstreamBody)> {
        match self {
            UpstreamError::Status { headers, body, .. } if !body.is_empty() => {
                Some((headers, body))
            }
            _ => None,
        }
    }
}

/// Capability to forward one request to the upstream API.
#[async_trait]
pub trait UpstreamClient: Send + Sync + 'static {
    async fn forward(&self, request: UpstreamRequest) -> Result<UpstreamResponse, UpstreamError>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_response_kind_from_accept() {
        let pdf = HeaderValue::from_static("application/pdf");
        let mixed = HeaderValue::from_static("Application/PDF, application/json;q=0.5");
        let json = HeaderValue::from_static("application/json");

        assert_eq!(ResponseKind::from_accept(Some(&pdf)), ResponseKind::Binary);
        assert_eq!(ResponseKind::from_accept(Some(&mixed)), ResponseKind::Binary);
        assert_eq!(ResponseKind::from_accept(Some(&json)), ResponseKind::Json);
        assert_eq!(ResponseKind::from_accept(None), ResponseKind::Json);
    }

    #[test]
    fn test_decode_json() {
        let body = UpstreamBody::decode(Bytes::from_static(br#"{"id":1}"#), ResponseKind::Json);
        assert_eq!(body, UpstreamBody::Json(json!({"id": 1})));
    }

    #[test]
    fn test_decode_non_json_falls_back_to_bytes() {
        let raw = Bytes::from_static(b"<html>oops</html>");
        let body = UpstreamBody::decode(raw.clone(), ResponseKind::Json);
        assert_eq!(body, UpstreamBody::Bytes(raw));
    }

    #[test]
    fn test_decode_binary_keeps_json_looking_bytes() {
        let raw = Bytes::from_static(br#"{"id":1}"#);
        let body = UpstreamBody::decode(raw.clone(), ResponseKind::Binary);
        assert_eq!(body, UpstreamBody::Bytes(raw));
    }

    #[test]
    fn test_decode_empty() {
        assert_eq!(
            UpstreamBody::decode(Bytes::new(), ResponseKind::Json),
            UpstreamBody::Empty
        );
        assert_eq!(
            UpstreamBody::decode(Bytes::new(), ResponseKind::Binary),
            UpstreamBody::Empty
        );
    }

    #[test]
    fn test_error_status_and_body() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        let err = UpstreamError::Status {
            status: StatusCode::NOT_FOUND,
            headers,
            body: UpstreamBody::Json(json!({"error": "not found"})),
        };
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
        assert_eq!(err.kind(), "status");
        let (headers, body) = err.into_parts().unwrap();
        assert_eq!(headers["content-type"], "application/json");
        assert_eq!(body, UpstreamBody::Json(json!({"error": "not found"})));

        let err = UpstreamError::Status {
            status: StatusCode::BAD_GATEWAY,
            headers: HeaderMap::new(),
            body: UpstreamBody::Empty,
        };
        assert!(err.into_parts().is_none());

        let err = UpstreamError::Transport("connection refused".to_string());
        assert_eq!(err.status(), None);
        assert!(err.into_parts().is_none());
    }
}
