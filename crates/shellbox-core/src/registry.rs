//! Session registry
//!
//! Owns every live [`Session`] and the per-id exec locks that keep two
//! execs on the same id from interleaving.

use crate::session::Session;
use crate::types::SessionId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

/// Map from session id to session, shared by one manager.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
    exec_locks: StdMutex<HashMap<SessionId, Arc<Mutex<()>>>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether no session is live.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Whether `id` names a live session.
    pub async fn contains(&self, id: &SessionId) -> bool {
        self.sessions.read().await.contains_key(id)
    }

    /// Ids of all live sessions.
    pub async fn ids(&self) -> Vec<SessionId> {
        self.sessions.read().await.keys().cloned().collect()
    }

    pub(crate) async fn get(&self, id: &SessionId) -> Option<Arc<Session>> {
        self.sessions.read().await.get(id).cloned()
    }

    pub(crate) async fn insert(&self, session: Arc<Session>) {
        let id = session.id().clone();
        self.sessions.write().await.insert(id, session);
    }

    pub(crate) async fn remove(&self, id: &SessionId) -> Option<Arc<Session>> {
        self.sessions.write().await.remove(id)
    }

    pub(crate) async fn all(&self) -> Vec<Arc<Session>> {
        self.sessions.read().await.values().cloned().collect()
    }

    /// Lock serializing execs (and closes) on one id.
    fn exec_lock(&self, id: &SessionId) -> Arc<Mutex<()>> {
        let mut locks = self.exec_locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(id.clone()).or_default())
    }

    /// Wait for the exec lock of `id`.
    ///
    /// The map entry is released when the returned guard drops, including
    /// when the waiting or holding future is cancelled.
    pub(crate) async fn lock_exec(&self, id: &SessionId) -> ExecLockGuard<'_> {
        let mut guard = ExecLockGuard {
            registry: self,
            id: id.clone(),
            lock: self.exec_lock(id),
            held: None,
        };
        guard.held = Some(Arc::clone(&guard.lock).lock_owned().await);
        guard
    }

    /// Drop the lock entry for `id` once nobody but the caller holds it.
    ///
    /// The caller passes in its own clone, so two strong refs means the map
    /// entry and the caller are the only owners.
    pub(crate) fn release_exec_lock(&self, id: &SessionId, lock: &Arc<Mutex<()>>) {
        let mut locks = self.exec_locks.lock().unwrap_or_else(PoisonError::into_inner);
        if Arc::strong_count(lock) <= 2 {
            locks.remove(id);
        }
    }

    #[cfg(test)]
    pub(crate) fn exec_lock_count(&self) -> usize {
        self.exec_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Held exec lock for one id. Unlocks and releases the map entry on drop.
pub(crate) struct ExecLockGuard<'a> {
    registry: &'a SessionRegistry,
    id: SessionId,
    lock: Arc<Mutex<()>>,
    held: Option<OwnedMutexGuard<()>>,
}

impl Drop for ExecLockGuard<'_> {
    fn drop(&mut self) {
        // The owned guard keeps its own clone of the lock
        drop(self.held.take());
        self.registry.release_exec_lock(&self.id, &self.lock);
    }
}
