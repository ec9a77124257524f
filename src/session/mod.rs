//! Browser sessions: storage and per-request resolution.

pub mod layer;
pub mod store;

pub use layer::{CurrentSession, resolve_session};
pub use store::{MemorySessionStore, SessionError, SessionId, SessionStore};
