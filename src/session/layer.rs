//! Session resolution middleware.
//!
//! Maps the session cookie to a live session and records it in the request
//! extensions as [`CurrentSession`]. A request with no cookie, or with a cookie
//! naming an unknown or expired session, gets a fresh session and a
//! `Set-Cookie` on its response.
//!
//! Only `/csrf-token` and the proxied prefixes are session-bound. Monitoring
//! paths and routing misses are left without a session, so stray requests do
//! not grow the store.

use axum::extract::{FromRequestParts, Request, State};
use axum::http::HeaderValue;
use axum::http::header::SET_COOKIE;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use tracing::{debug, warn};

use super::store::SessionId;
use crate::config::{CSRF_TOKEN_PATH, Config};
use crate::error::{AppError, AppResult};
use crate::metrics;
use crate::proxy::match_prefix;
use crate::state::AppState;

/// The session bound to the current request.
#[derive(Debug, Clone)]
pub struct CurrentSession {
    pub id: SessionId,
    /// Whether the session was created by this request.
    pub is_new: bool,
}

impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentSession>()
            .cloned()
            .ok_or_else(|| AppError::Internal("request reached handler without a session".into()))
    }
}

/// Resolve or create the session for a request.
pub async fn resolve_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> AppResult<Response> {
    if !is_session_bound(&state.config, request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let presented = jar
        .get(&state.config.session_cookie_name)
        .and_then(|cookie| SessionId::parse(cookie.value()));

    let session = match presented {
        Some(id) if state.sessions.touch(&id).await? => CurrentSession { id, is_new: false },
        stale => {
            if let Some(id) = stale {
                debug!(session_id = %id, "Unknown or expired session cookie, starting a new session");
            }
            let id = state.sessions.create().await?;
            metrics::record_session_created();
            CurrentSession { id, is_new: true }
        }
    };

    request.extensions_mut().insert(session.clone());
    let mut response = next.run(request).await;

    if session.is_new {
        let cookie = session_cookie(
            &state.config.session_cookie_name,
            &session.id,
            state.config.deployment_mode.is_production(),
        );
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
            }
            Err(e) => warn!(error = %e, "Session cookie is not a valid header value"),
        }
    }

    Ok(response)
}

/// Whether requests to `path` carry a session.
fn is_session_bound(config: &Config, path: &str) -> bool {
    !config.is_monitoring_path(path)
        && (path == CSRF_TOKEN_PATH || match_prefix(path, &config.proxy_prefixes).is_some())
}

/// Render the `Set-Cookie` value for a new session.
fn session_cookie(name: &str, id: &SessionId, secure: bool) -> String {
    Cookie::build((name.to_string(), id.as_str().to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
        .to_string()
}
