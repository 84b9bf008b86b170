//! Bookkeeping of live server sessions.
//!
//! The registry never owns a connection; each session task does. An entry
//! exists from accept until the session's receive loop ends, and the
//! [`Registration`] guard makes sure it is removed exactly once.

use std::{
    collections::HashMap,
    fmt,
    net::SocketAddr,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::Instant,
};

/// Opaque per-connection identifier, unique for the life of the process.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub peer: Option<SocketAddr>,
    pub connected_at: Instant,
}

#[derive(Debug)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<SessionId, SessionInfo>>,
    next_id: AtomicU64,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Assigns a fresh identifier and records the session under it.
    pub fn register(self: &Arc<Self>, peer: Option<SocketAddr>) -> Registration {
        let id = SessionId(format!(
            "session-{}",
            self.next_id.fetch_add(1, Ordering::Relaxed)
        ));
        let info = SessionInfo {
            peer,
            connected_at: Instant::now(),
        };
        self.lock().insert(id.clone(), info);

        Registration {
            id,
            registry: Arc::clone(self),
            released: false,
        }
    }

    /// Removes `id`, returning `false` if it was already gone.
    pub fn remove(&self, id: &SessionId) -> bool {
        self.lock().remove(id).is_some()
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.lock().contains_key(id)
    }

    pub fn get(&self, id: &SessionId) -> Option<SessionInfo> {
        self.lock().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn ids(&self) -> Vec<SessionId> {
        self.lock().keys().cloned().collect()
    }

    // The map stays consistent even if a holder panicked, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, HashMap<SessionId, SessionInfo>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Keeps a session registered until it is released or dropped.
#[derive(Debug)]
pub struct Registration {
    id: SessionId,
    registry: Arc<SessionRegistry>,
    released: bool,
}

impl Registration {
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn info(&self) -> Option<SessionInfo> {
        self.registry.get(&self.id)
    }

    /// Removes the entry now. Returns `true` only for the call that actually
    /// removed it.
    pub fn release(&mut self) -> bool {
        if std::mem::replace(&mut self.released, true) {
            return false;
        }
        self.registry.remove(&self.id)
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.release();
    }
}
