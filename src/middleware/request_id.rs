//! Request ID propagation.
//!
//! An incoming `X-Request-Id` is kept; otherwise a UUIDv4 is generated. The id
//! is stored in the request extensions as [`RequestId`], forwarded to the
//! upstream API, and echoed on the response.

use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

/// Header name for request ID.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest client-supplied id that is reused as-is.
const MAX_REQUEST_ID_LEN: usize = 128;

/// Request ID of the current request.
#[derive(Debug, Clone)]
pub struct RequestId(pub HeaderValue);

impl RequestId {
    pub fn as_str(&self) -> &str {
        self.0.to_str().unwrap_or("unknown")
    }
}

/// Attach a request id to the request and its response.
pub async fn assign_request_id(mut request: Request, next: Next) -> Response {
    let id = incoming_request_id(&request).unwrap_or_else(generate_request_id);

    request.headers_mut().insert(REQUEST_ID_HEADER, id.clone());
    request.extensions_mut().insert(RequestId(id.clone()));

    let mut response = next.run(request).await;
    response.headers_mut().insert(REQUEST_ID_HEADER, id);
    response
}

fn incoming_request_id<B>(req: &axum::http::Request<B>) -> Option<HeaderValue> {
    req.headers()
        .get(REQUEST_ID_HEADER)
        .filter(|v| !v.is_empty() && v.len() <= MAX_REQUEST_ID_LEN && v.to_str().is_ok())
        .cloned()
}

fn generate_request_id() -> HeaderValue {
    let mut buf = Uuid::encode_buffer();
    let id = Uuid::new_v4().hyphenated().encode_lower(&mut buf);
    // A hyphenated UUID is always a valid header value.
    HeaderValue::from_str(id).unwrap_or_else(|_| HeaderValue::from_static("unknown"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_incoming_request_id_kept() {
        let req = axum::http::Request::builder()
            .header(REQUEST_ID_HEADER, "existing-id-123")
            .body(Body::empty())
            .unwrap();

        assert_eq!(incoming_request_id(&req).unwrap(), "existing-id-123");
    }

    #[test]
    fn test_empty_or_oversized_request_id_ignored() {
        let req = axum::http::Request::builder()
            .header(REQUEST_ID_HEADER, "")
            .body(Body::empty())
            .unwrap();
        assert!(incoming_request_id(&req).is_none());

        let req = axum::http::Request::builder()
            .header(REQUEST_ID_HEADER, "x".repeat(MAX_REQUEST_ID_LEN + 1))
            .body(Body::empty())
            .unwrap();
        assert!(incoming_request_id(&req).is_none());
    }

    #[test]
    fn test_generated_request_id_is_uuid() {
        let id = generate_request_id();
        assert!(Uuid::parse_str(id.to_str().unwrap()).is_ok());
    }
}
