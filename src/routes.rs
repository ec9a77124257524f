//! Application routing configuration with middleware stack.
//!
//! # Middleware Stack (outermost first)
//!
//! ```text
//! Request
//!    │
//!    ▼
//! ┌──────────────────┐
//! │   Request ID     │ ← Adds X-Request-Id header
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │   Request Log    │ ← One record per request (monitoring paths skipped)
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │  Error Report    │ ← Logs every AppError response
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │   Catch Panic    │ ← 500 envelope instead of a dropped connection
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │  CORS, Body Limit│
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │     Session      │ ← Set-Cookie for new sessions (token and proxy routes only)
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │ CSRF issue/check │ ← 403 on mutating requests without a matching token
//! └────────┬─────────┘
//!          ▼
//!      Handler
//! ```
//!
//! # Route Groups
//!
//! - `/health`, `/ready`, `/status` - Health & monitoring
//! - `/csrf-token` - Token for the SPA
//! - Each configured proxy prefix, itself and everything below it
//! - Anything else - `404 {"error":{"message":"Not Found"}}`

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{any, get};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::config::CSRF_TOKEN_PATH;
use crate::error::AppResult;
use crate::handlers;
use crate::middleware::{
    assign_request_id, enforce_csrf, issue_token, log_requests, panic_response, report_errors,
};
use crate::proxy;
use crate::session::resolve_session;
use crate::state::AppState;

/// Build the application router with all routes and middleware configured.
///
/// # Errors
///
/// Returns `AppError::ConfigError` if the configuration does not validate,
/// e.g. when two proxy prefixes would register the same route.
pub fn build_router(state: AppState) -> AppResult<Router> {
    let config = &state.config;
    config.validate()?;

    let cors = build_cors_layer(&config.cors_allowed_origins);

    let mut router = Router::new()
        // Health and status endpoints (no session, no request log)
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/status", get(handlers::status))
        .route(CSRF_TOKEN_PATH, get(handlers::csrf_token));

    for prefix in &config.proxy_prefixes {
        router = router
            .route(prefix, any(proxy::forward))
            .route(&format!("{prefix}/"), any(proxy::forward))
            .route(&format!("{prefix}/{{*rest}}"), any(proxy::forward));
    }
    info!(
        prefixes = ?config.proxy_prefixes,
        upstream = %config.upstream_url,
        "Proxy routes configured"
    );

    router = router.fallback(handlers::not_found);

    // =========================================================================
    // Apply Middleware Stack (order matters - applied bottom to top)
    // =========================================================================

    // 1. CSRF enforcement, then issuance, then session resolution
    router = router
        .layer(from_fn_with_state(state.clone(), enforce_csrf))
        .layer(from_fn_with_state(state.clone(), issue_token))
        .layer(from_fn_with_state(state.clone(), resolve_session));

    // 2. Request body size limit
    info!(
        max_size_mb = config.max_request_body_size / (1024 * 1024),
        "Request body size limit configured"
    );
    router = router.layer(DefaultBodyLimit::max(config.max_request_body_size));

    // 3. CORS
    router = router.layer(cors);

    // 4. Panics become 500 responses
    router = router.layer(CatchPanicLayer::custom(panic_response));

    // 5. Error reporting
    router = router.layer(from_fn_with_state(state.clone(), report_errors));

    // 6. Request log
    router = router.layer(from_fn_with_state(state.clone(), log_requests));

    // 7. Request ID
    router = router.layer(from_fn(assign_request_id));

    Ok(router.with_state(state))
}

/// Build CORS layer from configuration.
///
/// Credentials (the session cookie) are only allowed with explicit origins,
/// since browsers refuse them for a `*` origin.
fn build_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let allow_any = allowed_origins.iter().any(|o| o == "*");

    if allow_any {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    }
}
