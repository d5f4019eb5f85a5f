//! The managed session record.

use bytes::Bytes;
use tokio::time::Instant;

/// Where a session currently lives inside the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Attached to an active connection, held in the registry.
    Live,
    /// Disconnected and retained in the detached pool for resume.
    Detached,
}

/// One user's durable session.
///
/// The manager owns the canonical copy. Values returned by
/// [`Manager::get`](crate::Manager::get) are snapshots; re-fetch after any
/// operation that may evict or expire the session.
#[derive(Debug, Clone)]
pub struct ManagedSession {
    /// Globally unique identifier, stable across reconnects.
    pub id: String,

    /// Client address at last attach.
    pub ip: String,

    /// Identity supplied by the authentication layer, if any.
    pub principal: Option<String>,

    /// When the session was first created. Never changes after that.
    pub created_at: Instant,

    /// Last touch or detach. Drives staleness sweeps.
    pub last_touched_at: Instant,

    /// Serialized application state captured at disconnect.
    ///
    /// `None` while live. On resume, [`Manager::register`](crate::Manager::register)
    /// hands the captured payload back through this field.
    pub detached_payload: Option<Bytes>,
}

impl ManagedSession {
    /// Create a new session stamped with the current time.
    pub fn new(id: impl Into<String>, ip: impl Into<String>) -> Self {
        let now = Instant::now();
        Self {
            id: id.into(),
            ip: ip.into(),
            principal: None,
            created_at: now,
            last_touched_at: now,
            detached_payload: None,
        }
    }

    /// Attach the authenticated principal.
    pub fn with_principal(mut self, principal: impl Into<String>) -> Self {
        self.principal = Some(principal.into());
        self
    }

    /// Override the creation timestamp.
    pub fn with_created_at(mut self, ts: Instant) -> Self {
        self.created_at = ts;
        if self.last_touched_at < ts {
            self.last_touched_at = ts;
        }
        self
    }

    /// Time since the session was last touched (or created, if never touched).
    pub fn idle_for(&self, now: Instant) -> std::time::Duration {
        now.saturating_duration_since(self.last_touched_at.max(self.created_at))
    }

    /// Refresh the recency timestamp.
    pub(crate) fn touch(&mut self, now: Instant) {
        self.last_touched_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_new_session_has_no_payload() {
        let session = ManagedSession::new("s-1", "10.0.0.1").with_principal("alice");
        assert_eq!(session.id, "s-1");
        assert_eq!(session.ip, "10.0.0.1");
        assert_eq!(session.principal.as_deref(), Some("alice"));
        assert!(session.detached_payload.is_none());
        assert_eq!(session.created_at, session.last_touched_at);
    }

    #[test]
    fn test_idle_for_uses_last_touch() {
        let base = Instant::now();
        let mut session = ManagedSession::new("s-1", "ip").with_created_at(base);
        session.touch(base + Duration::from_secs(10));

        assert_eq!(
            session.idle_for(base + Duration::from_secs(15)),
            Duration::from_secs(5)
        );
        // Clock readings before the last touch saturate to zero.
        assert_eq!(session.idle_for(base), Duration::ZERO);
    }
}
