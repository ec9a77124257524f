//! `reqwest`-backed [`UpstreamClient`].

use async_trait::async_trait;
use reqwest::Client;
use tracing::trace;

use super::{UpstreamBody, UpstreamClient, UpstreamError, UpstreamRequest, UpstreamResponse};
use crate::config::Config;

/// Forwards requests to the upstream API over HTTP.
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: Client,
    base_url: String,
}

impl HttpUpstream {
    /// Build a client with the configured base URL and timeouts.
    ///
    /// # Errors
    ///
    /// Returns `UpstreamError::InvalidRequest` if the HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .connect_timeout(config.upstream_connect_timeout)
            .timeout(config.upstream_timeout)
            .pool_idle_timeout(std::time::Duration::from_secs(90))
            .build()
            .map_err(|e| UpstreamError::InvalidRequest(format!("cannot build HTTP client: {e}")))?;

        Ok(Self::with_client(client, &config.upstream_url))
    }

    /// Use an existing `reqwest::Client`.
    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, path_and_query: &str) -> String {
        format!("{}{}", self.base_url, path_and_query)
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            UpstreamError::Timeout(e.to_string())
        } else if e.is_builder() {
            UpstreamError::InvalidRequest(e.to_string())
        } else {
            UpstreamError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl UpstreamClient for HttpUpstream {
    async fn forward(&self, request: UpstreamRequest) -> Result<UpstreamResponse, UpstreamError> {
        let url = self.url_for(&request.path_and_query);
        trace!(method = %request.method, url = %url, "Forwarding request upstream");

        let mut builder = self
            .client
            .request(request.method, &url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let raw = response.bytes().await?;
        let body = UpstreamBody::decode(raw, request.kind);

        if status.is_client_error() || status.is_server_error() {
            return Err(UpstreamError::Status {
                status,
                headers,
                body,
            });
        }

        Ok(UpstreamResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_base_and_path() {
        let upstream = HttpUpstream::with_client(Client::new(), "http://api.local/api/");

        assert_eq!(upstream.base_url(), "http://api.local/api");
        assert_eq!(
            upstream.url_for("/pets/3?full=1"),
            "http://api.local/api/pets/3?full=1"
        );
    }

    #[test]
    fn test_new_uses_configured_base_url() {
        let config = Config {
            upstream_url: "http://10.0.0.5:9000/api".to_string(),
            ..Config::default()
        };
        let upstream = HttpUpstream::new(&config).unwrap();

        assert_eq!(upstream.base_url(), "http://10.0.0.5:9000/api");
    }
}
