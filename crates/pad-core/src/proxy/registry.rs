//! Session Registry
//!
//! Concurrency-safe map of live sessions. Establishment inserts, teardown
//! removes, and everything else only reads.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use super::session::{Session, SessionId, SessionInfo};
use crate::error::{RelayError, Result};

/// Shared handle to the registry; clones refer to the same map
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<SessionId, Arc<Session>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a session. Fails if the id is already present.
    pub async fn insert(&self, session: Arc<Session>) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        match sessions.entry(session.id()) {
            Entry::Occupied(_) => Err(RelayError::DuplicateSession(session.id())),
            Entry::Vacant(slot) => {
                debug!("Registered session {}", session.id());
                slot.insert(session);
                Ok(())
            }
        }
    }

    /// Remove a session. Returns `None` if it was already gone.
    pub async fn remove(&self, id: &SessionId) -> Option<Arc<Session>> {
        let removed = self.sessions.write().await.remove(id);
        if removed.is_some() {
            debug!("Unregistered session {}", id);
        }
        removed
    }

    pub async fn get(&self, id: &SessionId) -> Option<Arc<Session>> {
        self.sessions.read().await.get(id).cloned()
    }

    pub async fn contains(&self, id: &SessionId) -> bool {
        self.sessions.read().await.contains_key(id)
    }

    /// Snapshot every live session
    pub async fn enumerate(&self) -> Vec<SessionInfo> {
        self.sessions
            .read()
            .await
            .values()
            .map(|session| session.info())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Request teardown of one session. Idempotent: the entry is removed by
    /// the session's own cleanup, not here.
    pub async fn close(&self, id: &SessionId) -> bool {
        match self.get(id).await {
            Some(session) => {
                session.cancel();
                true
            }
            None => false,
        }
    }

    /// Request teardown of every live session
    pub async fn close_all(&self) -> usize {
        let sessions: Vec<Arc<Session>> = self.sessions.read().await.values().cloned().collect();
        for session in &sessions {
            session.cancel();
        }
        sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tokio_util::sync::CancellationToken;

    fn session() -> Arc<Session> {
        Arc::new(Session::new(
            SessionId::generate(),
            "127.0.0.1:40000".parse().unwrap(),
            CancellationToken::new(),
        ))
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let registry = SessionRegistry::new();
        let session = session();

        registry.insert(Arc::clone(&session)).await.unwrap();

        assert_eq!(registry.len().await, 1);
        assert!(registry.contains(&session.id()).await);
        let found = registry.get(&session.id()).await.unwrap();
        assert!(Arc::ptr_eq(&found, &session));
    }

    #[tokio::test]
    async fn test_duplicate_insert_fails() {
        let registry = SessionRegistry::new();
        let session = session();

        registry.insert(Arc::clone(&session)).await.unwrap();
        let err = registry.insert(Arc::clone(&session)).await.unwrap_err();

        assert!(matches!(err, RelayError::DuplicateSession(id) if id == session.id()));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let registry = SessionRegistry::new();
        let session = session();
        registry.insert(Arc::clone(&session)).await.unwrap();

        assert!(registry.remove(&session.id()).await.is_some());
        assert!(registry.remove(&session.id()).await.is_none());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_close_cancels_without_removing() {
        let registry = SessionRegistry::new();
        let session = session();
        registry.insert(Arc::clone(&session)).await.unwrap();

        assert!(registry.close(&session.id()).await);
        assert!(registry.close(&session.id()).await);
        assert!(session.is_cancelled());
        assert!(registry.contains(&session.id()).await);

        registry.remove(&session.id()).await;
        assert!(!registry.close(&session.id()).await);
    }

    #[tokio::test]
    async fn test_close_all() {
        let registry = SessionRegistry::new();
        let sessions: Vec<_> = (0..3).map(|_| session()).collect();
        for session in &sessions {
            registry.insert(Arc::clone(session)).await.unwrap();
        }

        assert_eq!(registry.close_all().await, 3);
        assert!(sessions.iter().all(|s| s.is_cancelled()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_insert_and_remove() {
        let registry = SessionRegistry::new();

        let inserts: Vec<_> = (0..50)
            .map(|_| {
                let registry = registry.clone();
                tokio::spawn(async move {
                    let session = session();
                    registry.insert(Arc::clone(&session)).await.unwrap();
                    session.id()
                })
            })
            .collect();

        let mut ids = HashSet::new();
        for handle in inserts {
            ids.insert(handle.await.unwrap());
        }
        assert_eq!(ids.len(), 50);
        assert_eq!(registry.len().await, 50);

        let enumerated: HashSet<SessionId> =
            registry.enumerate().await.into_iter().map(|info| info.id).collect();
        assert_eq!(enumerated, ids);

        // Every id removed twice from two tasks: exactly one removal wins.
        let removals: Vec<_> = ids
            .iter()
            .flat_map(|id| [*id, *id])
            .map(|id| {
                let registry = registry.clone();
                tokio::spawn(async move { registry.remove(&id).await.is_some() })
            })
            .collect();

        let mut removed = 0;
        for handle in removals {
            if handle.await.unwrap() {
                removed += 1;
            }
        }
        assert_eq!(removed, 50);
        assert!(registry.is_empty().await);
    }
}
