//! Shared application state for Axum handlers and middleware.
//!
//! This module provides thread-safe, clonable state that is shared across
//! all requests. It includes:
//!
//! - **Configuration**: Runtime configuration access
//! - **Sessions**: The session store backing CSRF tokens
//! - **Upstream**: The client the proxy forwards through
//! - **Stats**: Lock-free counters for the `/status` endpoint
//!
//! # Structured Concurrency
//!
//! The session expiry sweep runs as a background task managed by
//! `tokio_util::task::TaskTracker` and `CancellationToken`. Call `shutdown()`
//! to stop it before application exit.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use axum::extract::FromRef;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, trace, warn};

use crate::config::{Config, DeploymentMode};
use crate::metrics;
use crate::session::{MemorySessionStore, SessionStore};
use crate::upstream::{HttpUpstream, UpstreamClient, UpstreamError};

/// Request counters reported by `/status`.
#[derive(Debug, Default)]
pub struct RequestStats {
    proxied: AtomicU64,
    upstream_failures: AtomicU64,
    csrf_rejections: AtomicU64,
}

/// Point-in-time copy of [`RequestStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub proxied: u64,
    pub upstream_failures: u64,
    pub csrf_rejections: u64,
}

impl RequestStats {
    pub fn record_proxied(&self) {
        self.proxied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_upstream_failure(&self) {
        self.upstream_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_csrf_rejection(&self) {
        self.csrf_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            proxied: self.proxied.load(Ordering::Relaxed),
            upstream_failures: self.upstream_failures.load(Ordering::Relaxed),
            csrf_rejections: self.csrf_rejections.load(Ordering::Relaxed),
        }
    }
}

/// Shared application state.
///
/// # Lifecycle
///
/// The sweep task is spawned when the state is created. Call `shutdown()`
/// before dropping:
///
/// ```rust,ignore
/// let state = AppState::from_config(config)?;
/// // ... serve ...
/// state.shutdown().await;
/// ```
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,
    /// Session storage
    pub sessions: Arc<dyn SessionStore>,
    /// Upstream API client
    pub upstream: Arc<dyn UpstreamClient>,
    /// Counters for `/status`
    pub stats: Arc<RequestStats>,
    /// Timestamp when the application started
    pub started_at: Instant,
    task_tracker: TaskTracker,
    cancellation_token: CancellationToken,
}

impl AppState {
    /// Create state from already-built components.
    ///
    /// Must be called inside a Tokio runtime: it spawns the session sweep.
    pub fn new(
        config: Config,
        sessions: Arc<dyn SessionStore>,
        upstream: Arc<dyn UpstreamClient>,
    ) -> Self {
        let state = Self {
            config: Arc::new(config),
            sessions,
            upstream,
            stats: Arc::new(RequestStats::default()),
            started_at: Instant::now(),
            task_tracker: TaskTracker::new(),
            cancellation_token: CancellationToken::new(),
        };

        state.spawn_session_sweep_task();
        state
    }

    /// Create state with the in-memory session store and the HTTP upstream client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: Config) -> Result<Self, UpstreamError> {
        let upstream = HttpUpstream::new(&config)?;
        let sessions = MemorySessionStore::new(config.session_ttl);
        Ok(Self::new(config, Arc::new(sessions), Arc::new(upstream)))
    }

    /// Periodically drop expired sessions.
    fn spawn_session_sweep_task(&self) {
        let sessions = self.sessions.clone();
        let every = self.config.session_sweep_interval;
        let cancel = self.cancellation_token.clone();

        self.task_tracker.spawn(async move {
            let mut ticker = interval(every);
            ticker.tick().await; // Skip the first immediate tick

            loop {
                tokio::select! {
                    biased;

                    _ = cancel.cancelled() => {
                        debug!("Session sweep task received cancellation signal");
                        break;
                    }
                    _ = ticker.tick() => sweep_sessions(sessions.as_ref()).await,
                }
            }

            debug!("Session sweep task shutting down");
        });
    }

    /// Stop background tasks and wait for them to finish.
    pub async fn shutdown(&self) {
        info!("Initiating graceful shutdown of background tasks");

        self.cancellation_token.cancel();
        self.task_tracker.close();
        self.task_tracker.wait().await;

        info!("All background tasks have completed");
    }

    /// Get the application uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

impl FromRef<AppState> for DeploymentMode {
    fn from_ref(state: &AppState) -> Self {
        state.config.deployment_mode
    }
}

async fn sweep_sessions(sessions: &dyn SessionStore) {
    match sessions.purge_expired().await {
        Ok(purged) => {
            if purged > 0 {
                debug!(purged, "Expired sessions removed");
            } else {
                trace!("Session sweep found nothing to remove");
            }
        }
        Err(e) => warn!(error = %e, "Session sweep failed"),
    }

    match sessions.count().await {
        Ok(live) => metrics::set_active_sessions(live),
        Err(e) => warn!(error = %e, "Failed to count sessions"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::test_support::FakeUpstream;
    use serde_json::json;

    #[test]
    fn test_stats_snapshot() {
        let stats = RequestStats::default();
        stats.record_proxied();
        stats.record_proxied();
        stats.record_upstream_failure();
        stats.record_csrf_rejection();

        assert_eq!(
            stats.snapshot(),
            StatsSnapshot {
                proxied: 2,
                upstream_failures: 1,
                csrf_rejections: 1,
            }
        );
    }

    #[tokio::test]
    async fn test_sweep_task_purges_expired_sessions() {
        let config = Config {
            session_ttl: Duration::from_millis(20),
            session_sweep_interval: Duration::from_millis(10),
            ..Config::default()
        };
        let sessions = Arc::new(MemorySessionStore::new(config.session_ttl));
        let state = AppState::new(
            config,
            sessions.clone(),
            Arc::new(FakeUpstream::ok_json(200, json!({}))),
        );

        sessions.create().await.unwrap();
        assert_eq!(sessions.count().await.unwrap(), 1);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(sessions.count().await.unwrap(), 0);

        state.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_completes() {
        let state = AppState::from_config(Config::default()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), state.shutdown())
            .await
            .unwrap();
    }
}
