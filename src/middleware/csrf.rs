//! Session-bound CSRF protection.
//!
//! Every session carries one random token, issued the first time the session
//! is seen and never replaced afterwards. The SPA reads it from
//! `GET /csrf-token` and echoes it back on state-changing requests in either
//! the `X-CSRF-Token` or the `X-XSRF-Token` header.
//!
//! # Checked Methods
//!
//! Only `POST`, `PUT`, `PATCH` and `DELETE` are checked. Everything else,
//! including CORS preflight `OPTIONS`, passes through untouched.
//!
//! # Rejection
//!
//! ```text
//! HTTP/1.1 403 Forbidden
//! {"error":"CSRF token missing or invalid"}
//! ```

use axum::Json;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use rand::RngCore;
use serde_json::json;
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::error::AppResult;
use crate::metrics;
use crate::session::{CurrentSession, SessionError, SessionId, SessionStore};
use crate::state::AppState;

/// Session key holding the CSRF token.
pub const CSRF_SESSION_KEY: &str = "csrf_token";

/// Primary request header carrying the client's token.
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Alternate request header (the name Angular-style clients use).
pub const XSRF_HEADER: &str = "x-xsrf-token";

/// Random bytes per token; hex encoding doubles the length.
pub const CSRF_TOKEN_BYTES: usize = 20;

/// Body of the 403 rejection.
pub const CSRF_REJECTION_MESSAGE: &str = "CSRF token missing or invalid";

const CHECKED_METHODS: [&str; 4] = ["POST", "PUT", "PATCH", "DELETE"];

/// Generate a fresh hex-encoded token from the thread-local CSPRNG.
pub fn generate_csrf_token() -> String {
    let mut bytes = [0u8; CSRF_TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Return the session's token, generating and storing it on first use.
///
/// Idempotent: once a token exists it is returned unchanged. Concurrent first
/// calls converge on a single stored value.
pub async fn issue_csrf_token(
    store: &dyn SessionStore,
    id: &SessionId,
) -> Result<String, SessionError> {
    if let Some(token) = store.get(id, CSRF_SESSION_KEY).await? {
        return Ok(token);
    }
    store
        .get_or_insert(id, CSRF_SESSION_KEY, generate_csrf_token())
        .await
}

/// Whether the method is one that must carry a valid token.
pub fn requires_csrf_check(method: &Method) -> bool {
    CHECKED_METHODS
        .iter()
        .any(|m| method.as_str().eq_ignore_ascii_case(m))
}

/// Token supplied by the client, if any. Empty header values count as absent.
pub fn supplied_token(headers: &HeaderMap) -> Option<&str> {
    [CSRF_HEADER, XSRF_HEADER].iter().find_map(|name| {
        headers
            .get(*name)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
    })
}

/// Both tokens present and byte-for-byte equal.
pub fn tokens_match(expected: Option<&str>, supplied: Option<&str>) -> bool {
    match (expected, supplied) {
        (Some(expected), Some(supplied)) => {
            bool::from(expected.as_bytes().ct_eq(supplied.as_bytes()))
        }
        _ => false,
    }
}

/// Issue the CSRF token for the request's session, if it has one.
pub async fn issue_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> AppResult<Response> {
    let session = request.extensions().get::<CurrentSession>().cloned();
    if let Some(session) = session {
        issue_csrf_token(state.sessions.as_ref(), &session.id).await?;
    }
    Ok(next.run(request).await)
}

/// Reject mutating requests whose token does not match the session's.
pub async fn enforce_csrf(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> AppResult<Response> {
    if !requires_csrf_check(request.method()) {
        return Ok(next.run(request).await);
    }

    let session = request.extensions().get::<CurrentSession>().cloned();
    let expected = match &session {
        Some(session) => state.sessions.get(&session.id, CSRF_SESSION_KEY).await?,
        None => None,
    };

    if tokens_match(expected.as_deref(), supplied_token(request.headers())) {
        return Ok(next.run(request).await);
    }

    warn!(
        method = %request.method(),
        path = %request.uri().path(),
        has_session = session.is_some(),
        token_supplied = supplied_token(request.headers()).is_some(),
        "Rejected request with missing or invalid CSRF token"
    );
    state.stats.record_csrf_rejection();
    metrics::record_csrf_rejection(request.method().as_str());

    Ok(csrf_rejection())
}

/// Build the 403 rejection response.
pub fn csrf_rejection() -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(json!({ "error": CSRF_REJECTION_MESSAGE })),
    )
        .into_response()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::session::MemorySessionStore;

    #[test]
    fn test_generated_token_shape() {
        let token = generate_csrf_token();

        assert_eq!(token.len(), CSRF_TOKEN_BYTES * 2);
        assert!(token.bytes().all(|b| b.is_ascii_hexdigit()));
        assert_ne!(token, generate_csrf_token());
    }

    #[tokio::test]
    async fn test_issue_is_idempotent_per_session() {
        let store = MemorySessionStore::new(Duration::from_secs(60));
        let id = store.create().await.unwrap();

        let first = issue_csrf_token(&store, &id).await.unwrap();
        for _ in 0..10 {
            assert_eq!(issue_csrf_token(&store, &id).await.unwrap(), first);
        }
        assert_eq!(
            store.get(&id, CSRF_SESSION_KEY).await.unwrap(),
            Some(first)
        );
    }

    #[tokio::test]
    async fn test_sessions_get_distinct_tokens() {
        let store = MemorySessionStore::new(Duration::from_secs(60));
        let a = store.create().await.unwrap();
        let b = store.create().await.unwrap();

        assert_ne!(
            issue_csrf_token(&store, &a).await.unwrap(),
            issue_csrf_token(&store, &b).await.unwrap()
        );
    }

    #[test]
    fn test_requires_csrf_check() {
        for method in ["POST", "PUT", "PATCH", "DELETE"] {
            assert!(requires_csrf_check(&Method::from_bytes(method.as_bytes()).unwrap()));
        }
        for method in ["GET", "HEAD", "OPTIONS", "TRACE"] {
            assert!(!requires_csrf_check(&Method::from_bytes(method.as_bytes()).unwrap()));
        }
    }

    #[test]
    fn test_requires_csrf_check_ignores_case() {
        let lower = Method::from_bytes(b"delete").unwrap();
        assert!(requires_csrf_check(&lower));
    }

    #[test]
    fn test_supplied_token_prefers_csrf_header() {
        let mut headers = HeaderMap::new();
        headers.insert(XSRF_HEADER, "xsrf".parse().unwrap());
        assert_eq!(supplied_token(&headers), Some("xsrf"));

        headers.insert(CSRF_HEADER, "csrf".parse().unwrap());
        assert_eq!(supplied_token(&headers), Some("csrf"));
    }

    #[test]
    fn test_supplied_token_empty_is_absent() {
        let mut headers = HeaderMap::new();
        headers.insert(CSRF_HEADER, "".parse().unwrap());
        assert_eq!(supplied_token(&headers), None);
    }

    #[test]
    fn test_tokens_match() {
        assert!(tokens_match(Some("abc"), Some("abc")));
        assert!(!tokens_match(Some("abc"), Some("abd")));
        assert!(!tokens_match(Some("abc"), Some("abcd")));
        assert!(!tokens_match(Some("abc"), None));
        assert!(!tokens_match(None, Some("abc")));
        assert!(!tokens_match(None, None));
    }

    #[tokio::test]
    async fn test_rejection_body() {
        let response = csrf_rejection();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], br#"{"error":"CSRF token missing or invalid"}"#);
    }
}
