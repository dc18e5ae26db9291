//! In-memory session registry.
//!
//! The single source of truth for which sessions exist. All mutations go
//! through one lock, so insert, update and evict are atomic with respect to
//! concurrent tool calls.

use crate::session::types::{Session, SessionHandle, SessionStatus};
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("session {0} not found")]
    NotFound(SessionHandle),

    #[error("session {0} is already registered")]
    AlreadyRegistered(SessionHandle),

    #[error("session handle {0} was removed and cannot be reused")]
    Retired(SessionHandle),
}

#[derive(Default)]
struct RegistryState {
    sessions: HashMap<SessionHandle, Session>,
    retired: HashSet<SessionHandle>,
}

/// Registry of active sessions.
///
/// Created once at process start and handed to the
/// [`SessionManager`](super::SessionManager); dropped at process stop.
#[derive(Default)]
pub struct SessionRegistry {
    state: Mutex<RegistryState>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new active session.
    pub async fn put(&self, session: Session) -> Result<(), RegistryError> {
        let mut state = self.state.lock().await;
        let handle = session.handle.clone();

        if state.retired.contains(&handle) {
            return Err(RegistryError::Retired(handle));
        }
        if state.sessions.contains_key(&handle) {
            return Err(RegistryError::AlreadyRegistered(handle));
        }

        debug!("Registered session {}", handle);
        state.sessions.insert(handle, session);
        Ok(())
    }

    /// Snapshot of a session record.
    pub async fn get(&self, handle: &SessionHandle) -> Result<Session, RegistryError> {
        let state = self.state.lock().await;
        state
            .sessions
            .get(handle)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(handle.clone()))
    }

    /// Mutate a session record in place.
    pub async fn update<F, T>(&self, handle: &SessionHandle, f: F) -> Result<T, RegistryError>
    where
        F: FnOnce(&mut Session) -> T,
    {
        let mut state = self.state.lock().await;
        let session = state
            .sessions
            .get_mut(handle)
            .ok_or_else(|| RegistryError::NotFound(handle.clone()))?;
        Ok(f(session))
    }

    /// Evict a session, returning its final record marked as removed.
    pub async fn remove(&self, handle: &SessionHandle) -> Result<Session, RegistryError> {
        let mut state = self.state.lock().await;
        let mut session = state
            .sessions
            .remove(handle)
            .ok_or_else(|| RegistryError::NotFound(handle.clone()))?;

        state.retired.insert(handle.clone());
        session.status = SessionStatus::Removed;

        debug!("Evicted session {}", handle);
        Ok(session)
    }

    /// All active sessions, in no particular order.
    pub async fn list(&self) -> Vec<Session> {
        let state = self.state.lock().await;
        state.sessions.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.sessions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::types::{Persistence, Workspace};
    use std::path::PathBuf;

    fn session(id: &str) -> Session {
        Session::new(
            SessionHandle::new(id),
            "alpine:latest",
            Persistence::Transient,
            Workspace::Ephemeral(PathBuf::from(format!("/tmp/{id}"))),
        )
    }

    #[tokio::test]
    async fn test_put_get_list() {
        let registry = SessionRegistry::new();
        registry.put(session("a")).await.unwrap();
        registry.put(session("b")).await.unwrap();

        let record = registry.get(&SessionHandle::new("a")).await.unwrap();
        assert_eq!(record.image, "alpine:latest");

        let mut handles: Vec<_> = registry
            .list()
            .await
            .into_iter()
            .map(|s| s.handle.to_string())
            .collect();
        handles.sort();
        assert_eq!(handles, vec!["a", "b"]);
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn test_unknown_handle_is_not_found() {
        let registry = SessionRegistry::new();
        let handle = SessionHandle::new("missing");

        assert_eq!(
            registry.get(&handle).await.unwrap_err(),
            RegistryError::NotFound(handle.clone())
        );
        assert_eq!(
            registry.remove(&handle).await.unwrap_err(),
            RegistryError::NotFound(handle.clone())
        );
        assert!(registry.update(&handle, |_| ()).await.is_err());
    }

    #[tokio::test]
    async fn test_remove_marks_removed_and_retires_handle() {
        let registry = SessionRegistry::new();
        registry.put(session("a")).await.unwrap();

        let handle = SessionHandle::new("a");
        let removed = registry.remove(&handle).await.unwrap();
        assert_eq!(removed.status, SessionStatus::Removed);
        assert!(registry.is_empty().await);

        assert!(matches!(
            registry.get(&handle).await,
            Err(RegistryError::NotFound(_))
        ));
        assert!(matches!(
            registry.remove(&handle).await,
            Err(RegistryError::NotFound(_))
        ));
        assert_eq!(
            registry.put(session("a")).await.unwrap_err(),
            RegistryError::Retired(handle)
        );
    }

    #[tokio::test]
    async fn test_duplicate_put_rejected() {
        let registry = SessionRegistry::new();
        registry.put(session("a")).await.unwrap();
        assert!(matches!(
            registry.put(session("a")).await,
            Err(RegistryError::AlreadyRegistered(_))
        ));
    }

    #[tokio::test]
    async fn test_update_records_files() {
        let registry = SessionRegistry::new();
        registry.put(session("a")).await.unwrap();
        let handle = SessionHandle::new("a");

        let count = registry
            .update(&handle, |s| {
                s.created_files.record("main.py");
                s.created_files.len()
            })
            .await
            .unwrap();
        assert_eq!(count, 1);

        let record = registry.get(&handle).await.unwrap();
        assert!(record.created_files.contains("main.py"));
    }
}
