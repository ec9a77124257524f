//! Fakes and log capture shared by the unit tests.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::io;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::http::{HeaderMap, StatusCode};
use serde_json::Value;
use tracing::subscriber::DefaultGuard;

use crate::config::Config;
use crate::session::MemorySessionStore;
use crate::state::AppState;
use crate::upstream::{
    UpstreamBody, UpstreamClient, UpstreamError, UpstreamRequest, UpstreamResponse,
};

enum Outcome {
    Respond(UpstreamResponse),
    Fail(UpstreamError),
    Panic,
}

/// Upstream answering every request the same way and recording what it got.
pub(crate) struct FakeUpstream {
    outcome: Outcome,
    requests: Mutex<Vec<UpstreamRequest>>,
}

impl FakeUpstream {
    fn with(outcome: Outcome) -> Self {
        Self {
            outcome,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn ok(status: StatusCode, headers: HeaderMap, body: UpstreamBody) -> Self {
        Self::with(Outcome::Respond(UpstreamResponse {
            status,
            headers,
            body,
        }))
    }

    pub(crate) fn ok_json(status: u16, body: Value) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", "application/json".parse().unwrap());
        headers.insert("transfer-encoding", "chunked".parse().unwrap());
        Self::ok(
            StatusCode::from_u16(status).unwrap(),
            headers,
            UpstreamBody::Json(body),
        )
    }

    pub(crate) fn failing(error: UpstreamError) -> Self {
        Self::with(Outcome::Fail(error))
    }

    pub(crate) fn panicking() -> Self {
        Self::with(Outcome::Panic)
    }

    /// Requests received so far, oldest first.
    pub(crate) fn requests(&self) -> Vec<UpstreamRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl UpstreamClient for FakeUpstream {
    async fn forward(&self, request: UpstreamRequest) -> Result<UpstreamResponse, UpstreamError> {
        self.requests.lock().unwrap().push(request);
        match &self.outcome {
            Outcome::Respond(response) => Ok(response.clone()),
            Outcome::Fail(error) => Err(error.clone()),
            Outcome::Panic => panic!("fake upstream exploded"),
        }
    }
}

/// State with an in-memory session store and the given upstream.
pub(crate) fn test_state(config: Config, upstream: Arc<dyn UpstreamClient>) -> AppState {
    let sessions = Arc::new(MemorySessionStore::new(config.session_ttl));
    AppState::new(config, sessions, upstream)
}

/// Log output of a JSON `fmt` subscriber, one record per line.
#[derive(Clone, Default)]
pub(crate) struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    /// Route the current thread's records here until the guard drops.
    pub(crate) fn install(&self) -> DefaultGuard {
        let logs = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_max_level(tracing::Level::TRACE)
            .with_writer(move || logs.clone())
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    /// Records whose message equals `message`.
    pub(crate) fn records(&self, message: &str) -> Vec<Value> {
        let raw = self.0.lock().unwrap().clone();
        String::from_utf8(raw)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str::<Value>(line).unwrap())
            .filter(|record| record["fields"]["message"] == message)
            .collect()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
