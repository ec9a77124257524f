//! Health, readiness, and status endpoints.
//!
//! # Endpoints
//!
//! - `GET /health` - Liveness check
//! - `GET /ready` - Kubernetes-compatible readiness probe
//! - `GET /status` - Uptime and request counters for the monitoring dashboard
//!
//! All three sit under the monitoring paths: they get no session and no
//! request log line.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use chrono::Utc;
use tracing::{instrument, warn};

use crate::error::AppResult;
use crate::models::{HealthResponse, StatusResponse};
use crate::state::AppState;

/// Health check endpoint. Always 200 while the process serves requests.
///
/// # Response Body
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "timestamp": "2024-01-15T10:30:00Z"
/// }
/// ```
#[instrument]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
    })
}

/// Readiness check endpoint for Kubernetes probes.
///
/// Returns 503 when the session store cannot be reached, since no request
/// outside the monitoring paths can be served without it.
#[instrument(skip(state))]
pub async fn readiness_check(State(state): State<AppState>) -> Result<StatusCode, StatusCode> {
    match state.sessions.count().await {
        Ok(_) => Ok(StatusCode::OK),
        Err(e) => {
            warn!(error = %e, "Readiness check failed");
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

/// Status endpoint.
///
/// # Response Body
///
/// ```json
/// {
///   "status": "ok",
///   "version": "0.1.0",
///   "environment": "production",
///   "uptime_seconds": 3600,
///   "sessions": 12,
///   "proxied_requests": 4521,
///   "upstream_failures": 3,
///   "csrf_rejections": 1
/// }
/// ```
#[instrument(skip(state))]
pub async fn status(State(state): State<AppState>) -> AppResult<Json<StatusResponse>> {
    let sessions = state.sessions.count().await?;
    let counters = state.stats.snapshot();

    Ok(Json(StatusResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        environment: state.config.deployment_mode.to_string(),
        uptime_seconds: state.uptime_seconds(),
        sessions,
        proxied_requests: counters.proxied,
        upstream_failures: counters.upstream_failures,
        csrf_rejections: counters.csrf_rejections,
    }))
}
