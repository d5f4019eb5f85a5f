//! Registry of live sessions.

use std::collections::HashMap;

use crate::session::ManagedSession;

/// Sessions currently attached to a connection, keyed by ID.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    live: HashMap<String, ManagedSession>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the live entry for `session.id`.
    ///
    /// Returns the entry that was replaced, if any.
    pub fn insert(&mut self, session: ManagedSession) -> Option<ManagedSession> {
        self.live.insert(session.id.clone(), session)
    }

    /// Look up a live session.
    pub fn get(&self, id: &str) -> Option<&ManagedSession> {
        self.live.get(id)
    }

    /// Remove a live session.
    pub fn remove(&mut self, id: &str) -> Option<ManagedSession> {
        self.live.remove(id)
    }

    /// Check if a session is live.
    pub fn contains(&self, id: &str) -> bool {
        self.live.contains_key(id)
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// Check if no sessions are live.
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// IDs of all live sessions, in no particular order.
    pub fn ids(&self) -> Vec<String> {
        self.live.keys().cloned().collect()
    }
}
