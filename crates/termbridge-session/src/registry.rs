//! Registry of live client connections.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use termbridge_core::{Error, Result, SessionId, SessionInfo};

/// Process-wide table of live relay sessions.
///
/// Tracks liveness only. Session state is owned by each relay task and is
/// never reached through the registry.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, SessionInfo>>,
    max_sessions: usize,
}

impl SessionRegistry {
    /// Create an empty registry admitting at most `max_sessions` entries.
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_sessions,
        }
    }

    /// Register a new client connection.
    pub fn register(&self, peer: Option<String>) -> Result<SessionInfo> {
        let mut sessions = self.write();
        if sessions.len() >= self.max_sessions {
            return Err(Error::SessionLimitReached(self.max_sessions));
        }

        let info = SessionInfo::new(SessionId::new(), peer);
        sessions.insert(info.id, info.clone());
        debug!("Registered session {} ({} live)", info.id, sessions.len());

        Ok(info)
    }

    /// Remove a session; returns its record if it was registered.
    pub fn unregister(&self, id: &SessionId) -> Option<SessionInfo> {
        let mut sessions = self.write();
        let removed = sessions.remove(id);
        if removed.is_some() {
            debug!("Unregistered session {} ({} live)", id, sessions.len());
        }
        removed
    }

    /// Look up one session.
    pub fn get(&self, id: &SessionId) -> Result<SessionInfo> {
        self.read()
            .get(id)
            .cloned()
            .ok_or(Error::SessionNotFound(*id))
    }

    /// All live sessions, oldest first.
    pub fn list(&self) -> Vec<SessionInfo> {
        let mut sessions: Vec<SessionInfo> = self.read().values().cloned().collect();
        sessions.sort_by_key(|s| s.opened_at);
        sessions
    }

    /// Number of live sessions.
    pub fn count(&self) -> usize {
        self.read().len()
    }

    /// Configured session limit.
    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    // The map holds plain data, so a poisoned lock is still consistent.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<SessionId, SessionInfo>> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<SessionId, SessionInfo>> {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner)
    }
}
