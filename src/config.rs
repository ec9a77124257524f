//! Application configuration loaded from environment variables.
//!
//! # Configuration Hierarchy
//!
//! All configuration is loaded from environment variables with sensible defaults
//! for development. In production, configure via environment variables or a `.env` file.
//!
//! # Upstream Configuration
//!
//! - `UPSTREAM_URL`: Base URL of the pet-care API, including its `/api` namespace
//!   (default: `http://localhost:8080/api`)
//! - `PROXY_PREFIXES`: Comma-separated path prefixes forwarded upstream
//!   (default: `/user,/pets,/appointments,/credits,/gifts`)
//! - `PROXY_REWRITES`: Optional `from=to` pairs replacing a prefix before forwarding
//!
//! # Session Configuration
//!
//! - `SESSION_COOKIE_NAME`: Name of the session cookie (default: `petcare.sid`)
//! - `SESSION_TTL_SECS`: Idle lifetime of a session (default: 86400)
//!
//! # Deployment Mode
//!
//! - `BFF_ENV`: `production` or `development` (default). Production mode switches
//!   logs to JSON, keeps error debug chains out of logs and marks cookies `Secure`.

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{AppError, AppResult};

/// Path of the endpoint handing the SPA its CSRF token.
pub const CSRF_TOKEN_PATH: &str = "/csrf-token";

/// Paths served by the BFF itself; never usable as proxy prefixes.
const RESERVED_PATHS: [&str; 4] = ["/health", "/ready", "/status", CSRF_TOKEN_PATH];

/// Deployment mode of the running process.
///
/// Resolved once at startup and handed to the components that behave
/// differently in production.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeploymentMode {
    #[default]
    Development,
    Production,
}

impl DeploymentMode {
    pub fn is_production(self) -> bool {
        self == DeploymentMode::Production
    }
}

impl FromStr for DeploymentMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(DeploymentMode::Production),
            "development" | "dev" | "test" => Ok(DeploymentMode::Development),
            other => Err(format!("unknown deployment mode '{other}'")),
        }
    }
}

impl fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeploymentMode::Development => f.write_str("development"),
            DeploymentMode::Production => f.write_str("production"),
        }
    }
}

/// Prefix replacement applied to proxied paths before forwarding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathRewrite {
    pub from: String,
    pub to: String,
}

/// Application configuration loaded from environment variables.
///
/// # Example
///
/// ```rust,ignore
/// let config = Config::from_env()?;
/// println!("BFF will listen on {}", config.server_addr());
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Server host address (default: "0.0.0.0")
    pub host: String,

    /// Server port (default: 3000)
    pub port: u16,

    /// Deployment mode (default: development)
    pub deployment_mode: DeploymentMode,

    // =========================================================================
    // Upstream Configuration
    // =========================================================================
    /// Base URL every proxied path is appended to
    pub upstream_url: String,

    /// Total time allowed for one upstream call (default: 30 seconds)
    pub upstream_timeout: Duration,

    /// Time allowed to establish the upstream connection (default: 5 seconds)
    pub upstream_connect_timeout: Duration,

    /// Path prefixes forwarded to the upstream API
    pub proxy_prefixes: Vec<String>,

    /// Prefix replacements; prefixes without an entry are forwarded unchanged
    pub proxy_rewrites: Vec<PathRewrite>,

    /// Maximum request body size in bytes (default: 10MB)
    pub max_request_body_size: usize,

    // =========================================================================
    // Session Configuration
    // =========================================================================
    /// Name of the cookie carrying the session id
    pub session_cookie_name: String,

    /// Sliding idle lifetime of a session
    pub session_ttl: Duration,

    /// Interval of the background sweep removing expired sessions
    pub session_sweep_interval: Duration,

    // =========================================================================
    // Security Configuration
    // =========================================================================
    /// Comma-separated list of allowed CORS origins
    /// Use "*" to allow all origins (not recommended for production)
    pub cors_allowed_origins: Vec<String>,

    // =========================================================================
    // Observability Configuration
    // =========================================================================
    /// Path prefixes of health and monitoring endpoints.
    /// Requests under these prefixes get no session and no request log line.
    pub monitoring_paths: Vec<String>,

    /// Log level (e.g., "info", "debug", "trace")
    pub log_level: String,

    /// Port for Prometheus metrics endpoint (default: 9090, 0 = disabled)
    pub metrics_port: u16,
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if any configuration value is invalid
    /// (e.g., non-numeric PORT value, malformed upstream URL).
    pub fn from_env() -> AppResult<Self> {
        // Load an .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let defaults = Self::default();

        let config = Self {
            // Server
            host: env::var("HOST").unwrap_or(defaults.host),
            port: Self::parse_env("PORT", defaults.port)?,
            deployment_mode: Self::parse_env("BFF_ENV", defaults.deployment_mode)?,

            // Upstream
            upstream_url: env::var("UPSTREAM_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.upstream_url),
            upstream_timeout: Duration::from_secs(Self::parse_env("UPSTREAM_TIMEOUT_SECS", 30)?),
            upstream_connect_timeout: Duration::from_secs(Self::parse_env(
                "UPSTREAM_CONNECT_TIMEOUT_SECS",
                5,
            )?),
            proxy_prefixes: Self::parse_list("PROXY_PREFIXES").unwrap_or(defaults.proxy_prefixes),
            proxy_rewrites: Self::parse_rewrites()?,
            max_request_body_size: Self::parse_env("MAX_REQUEST_BODY_SIZE", 10 * 1024 * 1024)?, // 10MB

            // Session
            session_cookie_name: env::var("SESSION_COOKIE_NAME")
                .ok()
                .filter(|name| !name.trim().is_empty())
                .unwrap_or(defaults.session_cookie_name),
            session_ttl: Duration::from_secs(Self::parse_env("SESSION_TTL_SECS", 86_400)?),
            session_sweep_interval: Duration::from_secs(Self::parse_env(
                "SESSION_SWEEP_INTERVAL_SECS",
                60,
            )?),

            // Security
            cors_allowed_origins: Self::parse_list("CORS_ALLOWED_ORIGINS")
                .unwrap_or(defaults.cors_allowed_origins),

            // Observability
            monitoring_paths: Self::parse_list("MONITORING_PATHS")
                .unwrap_or(defaults.monitoring_paths),
            log_level: env::var("RUST_LOG").unwrap_or(defaults.log_level),
            metrics_port: Self::parse_env("METRICS_PORT", defaults.metrics_port)?,
        };

        // Validate configuration before returning
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values for consistency and correctness.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if validation fails.
    pub fn validate(&self) -> AppResult<()> {
        if !(self.upstream_url.starts_with("http://") || self.upstream_url.starts_with("https://"))
        {
            return Err(AppError::ConfigError(format!(
                "UPSTREAM_URL must be an http(s) URL, got '{}'",
                self.upstream_url
            )));
        }

        if self.proxy_prefixes.is_empty() {
            return Err(AppError::ConfigError(
                "PROXY_PREFIXES must name at least one prefix".to_string(),
            ));
        }

        for (i, prefix) in self.proxy_prefixes.iter().enumerate() {
            if !prefix.starts_with('/')
                || prefix.len() < 2
                || prefix.ends_with('/')
                || prefix.contains(['{', '}', '*'])
            {
                return Err(AppError::ConfigError(format!(
                    "PROXY_PREFIXES entry '{prefix}' must look like '/name'"
                )));
            }
            if self.proxy_prefixes.iter().skip(i + 1).any(|p| p == prefix) {
                return Err(AppError::ConfigError(format!(
                    "PROXY_PREFIXES lists '{prefix}' more than once"
                )));
            }
            if RESERVED_PATHS.contains(&prefix.as_str()) {
                return Err(AppError::ConfigError(format!(
                    "PROXY_PREFIXES entry '{prefix}' collides with a built-in endpoint"
                )));
            }
            // Monitoring paths get neither a session nor a log record
            if self.is_monitoring_path(prefix) {
                return Err(AppError::ConfigError(format!(
                    "PROXY_PREFIXES entry '{prefix}' falls under MONITORING_PATHS"
                )));
            }
        }

        if self.is_monitoring_path(CSRF_TOKEN_PATH) {
            return Err(AppError::ConfigError(format!(
                "MONITORING_PATHS must not cover {CSRF_TOKEN_PATH}"
            )));
        }

        for rewrite in &self.proxy_rewrites {
            if !self.proxy_prefixes.contains(&rewrite.from) {
                return Err(AppError::ConfigError(format!(
                    "PROXY_REWRITES entry '{}' does not match any proxied prefix",
                    rewrite.from
                )));
            }
            if !rewrite.to.starts_with('/') {
                return Err(AppError::ConfigError(format!(
                    "PROXY_REWRITES target '{}' must start with '/'",
                    rewrite.to
                )));
            }
        }

        if self.session_ttl.is_zero() {
            return Err(AppError::ConfigError(
                "SESSION_TTL_SECS must be greater than 0".to_string(),
            ));
        }

        if self.session_sweep_interval.is_zero() {
            return Err(AppError::ConfigError(
                "SESSION_SWEEP_INTERVAL_SECS must be greater than 0".to_string(),
            ));
        }

        if self.upstream_timeout.is_zero() {
            return Err(AppError::ConfigError(
                "UPSTREAM_TIMEOUT_SECS must be greater than 0".to_string(),
            ));
        }

        // Validate max request body size is reasonable
        if self.max_request_body_size == 0 {
            return Err(AppError::ConfigError(
                "MAX_REQUEST_BODY_SIZE must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Get the full server address for binding.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Replacement for a proxied prefix. Identity unless a rewrite is configured.
    pub fn rewrite_for<'a>(&'a self, prefix: &'a str) -> &'a str {
        self.proxy_rewrites
            .iter()
            .find(|r| r.from == prefix)
            .map(|r| r.to.as_str())
            .unwrap_or(prefix)
    }

    /// Whether a path belongs to a health or monitoring endpoint.
    pub fn is_monitoring_path(&self, path: &str) -> bool {
        self.monitoring_paths.iter().any(|p| path.starts_with(p.as_str()))
    }

    /// Check if Prometheus metrics export is enabled.
    pub fn metrics_enabled(&self) -> bool {
        self.metrics_port > 0
    }

    /// Get the metrics endpoint address.
    ///
    /// Returns `None` if metrics are disabled (port = 0).
    pub fn metrics_addr(&self) -> Option<std::net::SocketAddr> {
        if self.metrics_enabled() {
            Some(std::net::SocketAddr::from((
                [0, 0, 0, 0],
                self.metrics_port,
            )))
        } else {
            None
        }
    }

    /// Parse an environment variable into the specified type with a default value.
    fn parse_env<T>(name: &str, default: T) -> AppResult<T>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match env::var(name) {
            Ok(val) => val
                .parse()
                .map_err(|e| AppError::ConfigError(format!("Invalid {name}: {e}"))),
            Err(_) => Ok(default),
        }
    }

    /// Parse a comma-separated list. `None` when the variable is unset.
    fn parse_list(name: &str) -> Option<Vec<String>> {
        env::var(name).ok().map(|raw| split_list(&raw))
    }

    /// Parse `PROXY_REWRITES` ("/from=/to,/other=/else").
    fn parse_rewrites() -> AppResult<Vec<PathRewrite>> {
        match env::var("PROXY_REWRITES") {
            Ok(raw) => parse_rewrite_pairs(&raw),
            Err(_) => Ok(Vec::new()),
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_rewrite_pairs(raw: &str) -> AppResult<Vec<PathRewrite>> {
    split_list(raw)
        .into_iter()
        .map(|pair| match pair.split_once('=') {
            Some((from, to)) => Ok(PathRewrite {
                from: from.trim().to_string(),
                to: to.trim().to_string(),
            }),
            None => Err(AppError::ConfigError(format!(
                "Invalid PROXY_REWRITES entry '{pair}', expected 'from=to'"
            ))),
        })
        .collect()
}

/// Default configuration for testing and development.
///
/// Production deployments should use `Config::from_env()` instead.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Server
            host: "0.0.0.0".to_string(),
            port: 3000,
            deployment_mode: DeploymentMode::Development,
            // Upstream
            upstream_url: "http://localhost:8080/api".to_string(),
            upstream_timeout: Duration::from_secs(30),
            upstream_connect_timeout: Duration::from_secs(5),
            proxy_prefixes: ["/user", "/pets", "/appointments", "/credits", "/gifts"]
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            proxy_rewrites: Vec::new(),
            max_request_body_size: 10 * 1024 * 1024, // 10MB
            // Session
            session_cookie_name: "petcare.sid".to_string(),
            session_ttl: Duration::from_secs(86_400),
            session_sweep_interval: Duration::from_secs(60),
            // Security
            cors_allowed_origins: vec!["*".to_string()],
            // Observability
            monitoring_paths: vec![
                "/status".to_string(),
                "/health".to_string(),
                "/ready".to_string(),
            ],
            log_level: "info".to_string(),
            metrics_port: 9090,
        }
    }
}
