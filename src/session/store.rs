//! Server-side session storage.
//!
//! Sessions are opaque ids mapped to a small string key/value record. Expiry
//! is sliding: every successful [`SessionStore::touch`] pushes it out by the
//! configured TTL. Expired records behave as absent and are removed by
//! [`SessionStore::purge_expired`], which the application runs periodically.

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Longest session id accepted from a cookie.
const MAX_SESSION_ID_LEN: usize = 128;

/// Errors raised by a [`SessionStore`].
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("session {0} does not exist or has expired")]
    NotFound(SessionId),
}

/// Opaque session identifier carried in the session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh random id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Accept an id read from a cookie.
    ///
    /// Returns `None` for values that could never have been issued, so they
    /// are not looked up at all.
    pub fn parse(raw: &str) -> Option<Self> {
        let valid = !raw.is_empty()
            && raw.len() <= MAX_SESSION_ID_LEN
            && raw.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-');
        valid.then(|| Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key/value session storage keyed by [`SessionId`].
///
/// Implementations must make [`SessionStore::get_or_insert`] atomic per
/// session: concurrent callers racing on the same key all observe the value
/// stored by the winner.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Create an empty session and return its id.
    async fn create(&self) -> Result<SessionId, SessionError>;

    /// Extend the expiry of a live session. Returns `false` if it is unknown or expired.
    async fn touch(&self, id: &SessionId) -> Result<bool, SessionError>;

    /// Read a value. Unknown or expired sessions read as `None`.
    async fn get(&self, id: &SessionId, key: &str) -> Result<Option<String>, SessionError>;

    /// Store `value` unless the key is already set; returns the value now stored.
    async fn get_or_insert(
        &self,
        id: &SessionId,
        key: &str,
        value: String,
    ) -> Result<String, SessionError>;

    /// Remove every expired session and return how many were removed.
    async fn purge_expired(&self) -> Result<usize, SessionError>;

    /// Number of stored sessions, expired ones included until purged.
    async fn count(&self) -> Result<usize, SessionError>;
}

#[derive(Debug)]
struct SessionRecord {
    values: HashMap<String, String>,
    expires_at: Instant,
}

impl SessionRecord {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// In-process [`SessionStore`] backed by a `HashMap` behind an async `RwLock`.
#[derive(Debug)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<SessionId, SessionRecord>>,
    ttl: Duration,
}

impl MemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self) -> Result<SessionId, SessionError> {
        let id = SessionId::generate();
        let record = SessionRecord {
            values: HashMap::new(),
            expires_at: Instant::now() + self.ttl,
        };
        self.sessions.write().await.insert(id.clone(), record);
        Ok(id)
    }

    async fn touch(&self, id: &SessionId) -> Result<bool, SessionError> {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(id) {
            Some(record) if record.is_live(now) => {
                record.expires_at = now + self.ttl;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get(&self, id: &SessionId, key: &str) -> Result<Option<String>, SessionError> {
        let now = Instant::now();
        let sessions = self.sessions.read().await;
        Ok(sessions
            .get(id)
            .filter(|record| record.is_live(now))
            .and_then(|record| record.values.get(key).cloned()))
    }

    async fn get_or_insert(
        &self,
        id: &SessionId,
        key: &str,
        value: String,
    ) -> Result<String, SessionError> {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let record = sessions
            .get_mut(id)
            .filter(|record| record.is_live(now))
            .ok_or_else(|| SessionError::NotFound(id.clone()))?;

        Ok(record
            .values
            .entry(key.to_string())
            .or_insert(value)
            .clone())
    }

    async fn purge_expired(&self) -> Result<usize, SessionError> {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, record| record.is_live(now));
        Ok(before - sessions.len())
    }

    async fn count(&self) -> Result<usize, SessionError> {
        Ok(self.sessions.read().await.len())
    }
}
