//! Session store backends.

use super::state::Session;
use crate::error::StorageResult;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::trace;

/// Keyed storage for dialogue sessions.
///
/// Constructed once at startup and shared by the controller. Backends must
/// serialize concurrent access to the same key.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load a session. Unknown ids yield the idle session.
    async fn get(&self, session_id: &str) -> StorageResult<Session>;

    /// Replace a session.
    async fn put(&self, session_id: &str, session: Session) -> StorageResult<()>;

    /// Reset a session to idle with empty fields.
    async fn clear(&self, session_id: &str) -> StorageResult<()>;
}

/// In-memory session store.
///
/// Idle sessions are not kept: storing or clearing to idle removes the entry.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemorySessionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions with a conversion in progress.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether no conversion is in progress.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, session_id: &str) -> StorageResult<Session> {
        Ok(self
            .sessions
            .read()
            .await
            .get(session_id)
            .copied()
            .unwrap_or_default())
    }

    async fn put(&self, session_id: &str, session: Session) -> StorageResult<()> {
        let mut sessions = self.sessions.write().await;
        if session.is_idle() {
            sessions.remove(session_id);
        } else {
            sessions.insert(session_id.to_string(), session);
        }
        trace!(session = %session_id, stage = %session.stage(), "session stored");
        Ok(())
    }

    async fn clear(&self, session_id: &str) -> StorageResult<()> {
        if self.sessions.write().await.remove(session_id).is_some() {
            trace!(session = %session_id, "session cleared");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::CurrencyCode;

    #[tokio::test]
    async fn test_unknown_session_is_idle() {
        let store = MemorySessionStore::new();
        assert!(store.get("telegram:1").await.unwrap().is_idle());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_put_get_clear() {
        let store = MemorySessionStore::new();

        let mut session = Session::awaiting_base();
        session.choose_base(CurrencyCode::parse("EUR").unwrap());
        store.put("telegram:1", session).await.unwrap();

        assert_eq!(store.get("telegram:1").await.unwrap(), session);
        assert!(store.get("telegram:2").await.unwrap().is_idle());
        assert_eq!(store.len().await, 1);

        store.clear("telegram:1").await.unwrap();
        assert!(store.get("telegram:1").await.unwrap().is_idle());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_clear_idle_is_noop() {
        let store = MemorySessionStore::new();
        store.clear("cli:direct").await.unwrap();
        store.clear("cli:direct").await.unwrap();
        assert_eq!(store.get("cli:direct").await.unwrap(), Session::idle());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_put_idle_removes_entry() {
        let store = MemorySessionStore::new();
        store
            .put("cli:direct", Session::awaiting_base())
            .await
            .unwrap();
        assert_eq!(store.len().await, 1);

        store.put("cli:direct", Session::idle()).await.unwrap();
        assert!(store.is_empty().await);
    }
}
