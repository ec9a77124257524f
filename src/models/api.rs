use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service health status
    pub status: String,
    /// Service version
    pub version: String,
    /// Current timestamp
    pub timestamp: DateTime<Utc>,
}

/// Monitoring dashboard data served by `/status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub version: String,
    /// `development` or `production`
    pub environment: String,
    pub uptime_seconds: u64,
    /// Stored sessions, expired ones included until the next sweep
    pub sessions: usize,
    /// Requests forwarded to the upstream API
    pub proxied_requests: u64,
    /// Forwarded requests that failed upstream
    pub upstream_failures: u64,
    /// Requests rejected for a missing or invalid CSRF token
    pub csrf_rejections: u64,
}

/// Token the SPA echoes back in `X-CSRF-Token`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CsrfTokenResponse {
    #[serde(rename = "csrfToken")]
    pub csrf_token: String,
}
