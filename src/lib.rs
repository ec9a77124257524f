//! # Pet-Care BFF
//!
//! Backend-for-frontend sitting between the pet-care single-page app and the
//! upstream pet-care API, featuring:
//!
//! - **CSRF Protection**: One random token per server-side session, checked on
//!   every `POST`, `PUT`, `PATCH` and `DELETE`
//! - **Proxying**: Configured path prefixes forwarded to the upstream `/api`,
//!   JSON and binary (PDF) bodies relayed with their status and headers
//! - **Error Handling**: A single JSON error envelope; 5xx details stay in the logs
//! - **Observability**: Request IDs, structured logging, Prometheus metrics,
//!   health endpoints
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Axum HTTP Server                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Middleware (Request ID → Log → Errors → Session → CSRF)    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Handlers (health, csrf-token, proxy, not found)            │
//! ├──────────────────────────────┬──────────────────────────────┤
//! │  SessionStore (in memory)    │  UpstreamClient (reqwest)    │
//! └──────────────────────────────┴──────────────────────────────┘
//!                                               │
//!                                     Upstream pet-care API
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use petcare_bff::{AppState, Config, build_router};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let state = AppState::from_config(config)?;
//!     let app = build_router(state)?;
//!
//!     // Start the server...
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! Point the BFF at the upstream API:
//! ```bash
//! UPSTREAM_URL=http://api.internal:8080/api BFF_ENV=production cargo run
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod proxy;
pub mod routes;
pub mod session;
pub mod state;
pub mod upstream;
pub mod utils;

#[cfg(test)]
mod test_support;

// Re-exports for convenience
pub use config::{Config, DeploymentMode};
pub use error::{AppError, AppResult};
pub use routes::build_router;
pub use session::{MemorySessionStore, SessionStore};
pub use state::AppState;
pub use upstream::{HttpUpstream, UpstreamClient};
