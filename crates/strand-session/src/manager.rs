//! Session lifecycle manager.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::RwLock;
use tokio::runtime::Handle;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::cleanup::{CleanupScheduler, Sweep};
use crate::config::ManagerConfig;
use crate::error::{Error, Result};
use crate::policy::{RandomSource, ThreadRandom};
use crate::pool::DetachedPool;
use crate::registry::SessionRegistry;
use crate::session::{ManagedSession, SessionState};

/// Registry and pool, always locked together.
#[derive(Debug, Default)]
struct State {
    registry: SessionRegistry,
    pool: DetachedPool,
    evicted: u64,
    expired: u64,
}

struct Shared {
    state: RwLock<State>,
    config: ManagerConfig,
    random: Box<dyn RandomSource>,
    scheduler: CleanupScheduler,
}

impl Shared {
    fn sweep_at(&self, now: Instant) -> usize {
        let mut state = self.state.write();
        let expired = state.pool.drain_expired(now, self.config.detached_ttl);
        let count = expired.len();

        for session in &expired {
            debug!(session_id = %session.id, "Expired detached session");
        }

        if count > 0 {
            state.expired += count as u64;
            debug!(
                count = count,
                pool_size = state.pool.len(),
                "Swept expired sessions"
            );
        }

        count
    }
}

impl Sweep for Shared {
    fn sweep_expired(&self) -> usize {
        self.sweep_at(Instant::now())
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        self.scheduler.cancel();
    }
}

/// Tracks live and detached sessions and bounds the detached pool.
///
/// All state sits behind one lock: `register`, `on_disconnect`, `touch`,
/// `remove` and the sweep take it for writing, lookups take it for reading.
/// Eviction runs inside the same critical section as the insert that
/// triggered it, so the pool is never observed over capacity.
///
/// Cloning is cheap and every clone shares the same state. The background
/// sweep stops on [`shutdown`](Self::shutdown) or when the last clone drops.
#[derive(Clone)]
pub struct Manager {
    shared: Arc<Shared>,
}

impl Manager {
    /// Create a manager using the thread-local RNG for random eviction.
    ///
    /// Must be called from within a Tokio runtime, which hosts the cleanup
    /// scheduler.
    pub fn new(config: ManagerConfig) -> Result<Self> {
        Self::with_random_source(config, ThreadRandom)
    }

    /// Create a manager with an injected random source.
    pub fn with_random_source<R>(config: ManagerConfig, random: R) -> Result<Self>
    where
        R: RandomSource + 'static,
    {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| Error::NoRuntime)?;

        debug!(
            max_detached_sessions = config.max_detached_sessions,
            policy = %config.eviction_policy,
            ttl_ms = config.detached_ttl.as_millis() as u64,
            "Starting session manager"
        );

        let shared = Arc::new_cyclic(|weak| Shared {
            state: RwLock::new(State::default()),
            scheduler: CleanupScheduler::spawn(&runtime, config.cleanup_interval, weak.clone()),
            random: Box::new(random),
            config,
        });

        Ok(Self { shared })
    }

    /// Get the manager configuration.
    pub fn config(&self) -> &ManagerConfig {
        &self.shared.config
    }

    /// Attach a session to a live connection.
    ///
    /// If the ID is detached, the pooled entry is taken out of the pool and
    /// the returned session carries its original creation time and the
    /// payload captured at disconnect. The copy kept in the registry holds
    /// no payload.
    pub fn register(&self, mut session: ManagedSession) -> Result<ManagedSession> {
        if session.id.trim().is_empty() {
            return Err(Error::InvalidSessionId(session.id));
        }

        let mut state = self.shared.state.write();

        if let Some(previous) = state.pool.remove(&session.id) {
            session.created_at = previous.created_at;
            session.detached_payload = previous.detached_payload;
            if session.principal.is_none() {
                session.principal = previous.principal;
            }
            debug!(
                session_id = %session.id,
                pool_size = state.pool.len(),
                "Resumed detached session"
            );
        } else if let Some(existing) = state.registry.get(&session.id) {
            session.created_at = existing.created_at;
            warn!(session_id = %session.id, "Session registered while already live, replacing");
        } else {
            debug!(session_id = %session.id, ip = %session.ip, "Registered session");
        }

        let mut live = session.clone();
        live.detached_payload = None;
        state.registry.insert(live);

        Ok(session)
    }

    /// Move a live session into the detached pool with its serialized state.
    ///
    /// A repeated disconnect for an already detached ID updates that entry
    /// in place. Disconnects for unknown IDs are ignored. If the pool grows
    /// past capacity, the configured policy evicts before this returns.
    pub fn on_disconnect(&self, id: &str, payload: impl Into<Bytes>) {
        let payload = payload.into();
        let now = Instant::now();
        let config = &self.shared.config;

        let mut guard = self.shared.state.write();
        let state = &mut *guard;

        if let Some(mut session) = state.registry.remove(id) {
            session.detached_payload = Some(payload);
            session.touch(now);
            state.pool.insert(session);
            debug!(session_id = %id, pool_size = state.pool.len(), "Detached session");
        } else if state.pool.refresh(id, payload, now) {
            debug!(session_id = %id, "Duplicate disconnect, updated detached entry");
        } else {
            warn!(session_id = %id, "Disconnect for unknown session ignored");
            return;
        }

        let evicted = state.pool.enforce_capacity(
            config.max_detached_sessions,
            config.eviction_policy,
            &*self.shared.random,
        );
        for session in &evicted {
            debug!(
                session_id = %session.id,
                policy = %config.eviction_policy,
                pool_size = state.pool.len(),
                "Evicted detached session"
            );
        }
        state.evicted += evicted.len() as u64;
    }

    /// Mark a detached session as most recently used.
    ///
    /// Returns `false` (and does nothing) if the ID is not detached.
    pub fn touch(&self, id: &str) -> bool {
        let touched = self.shared.state.write().pool.touch(id, Instant::now());
        trace!(session_id = %id, touched, "Touch");
        touched
    }

    /// Look up a session, live first, then detached.
    ///
    /// Does not affect recency; use [`touch`](Self::touch) for that.
    pub fn get(&self, id: &str) -> Option<ManagedSession> {
        let state = self.shared.state.read();
        let found = state
            .registry
            .get(id)
            .or_else(|| state.pool.get(id))
            .cloned();
        trace!(session_id = %id, found = found.is_some(), "Lookup");
        found
    }

    /// Report whether a session is live, detached, or unknown.
    pub fn state(&self, id: &str) -> Option<SessionState> {
        let state = self.shared.state.read();
        if state.registry.contains(id) {
            Some(SessionState::Live)
        } else if state.pool.contains(id) {
            Some(SessionState::Detached)
        } else {
            None
        }
    }

    /// Drop a session from wherever it is held, e.g. on logout.
    pub fn remove(&self, id: &str) -> Option<ManagedSession> {
        let mut state = self.shared.state.write();
        let removed = state
            .registry
            .remove(id)
            .or_else(|| state.pool.remove(id));
        if removed.is_some() {
            debug!(session_id = %id, "Removed session");
        }
        removed
    }

    /// Run a TTL sweep now and return how many sessions it removed.
    pub fn sweep_expired(&self) -> usize {
        self.shared.sweep_expired()
    }

    /// Detached IDs from most to least recently touched.
    pub fn detached_ids(&self) -> Vec<String> {
        self.shared.state.read().pool.ids()
    }

    /// Live IDs, in no particular order.
    pub fn live_ids(&self) -> Vec<String> {
        self.shared.state.read().registry.ids()
    }

    /// Current counts.
    pub fn stats(&self) -> ManagerStats {
        let state = self.shared.state.read();
        ManagerStats {
            live: state.registry.len(),
            detached: state.pool.len(),
            capacity: self.shared.config.max_detached_sessions,
            evicted: state.evicted,
            expired: state.expired,
        }
    }

    /// Whether the background sweep is still running.
    pub fn is_sweeping(&self) -> bool {
        self.shared.scheduler.is_running()
    }

    /// Stop the background sweep and wait for it to exit.
    ///
    /// Idempotent. Other operations keep working afterwards; only scheduled
    /// sweeps stop. Fails with [`Error::ShutdownTimeout`] if the sweep has
    /// not exited within `timeout`.
    pub async fn shutdown(&self, timeout: Duration) -> Result<()> {
        self.shared.scheduler.stop(timeout).await
    }
}

impl fmt::Debug for Manager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manager")
            .field("config", &self.shared.config)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

/// Manager statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerStats {
    /// Sessions attached to a connection.
    pub live: usize,

    /// Sessions in the detached pool.
    pub detached: usize,

    /// Detached pool capacity.
    pub capacity: usize,

    /// Sessions evicted for capacity since start.
    pub evicted: u64,

    /// Sessions expired by TTL since start.
    pub expired: u64,
}
