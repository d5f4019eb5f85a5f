//! Session lifecycle and eviction for Strand.
//!
//! This crate keeps per-user session state alive across disconnects:
//! - Live sessions are attached to a connection and held in a registry
//! - Detached sessions wait in a bounded pool so a reconnect can resume them
//! - A configurable policy (LRU, oldest, random) evicts when the pool overflows
//! - A background sweep expires detached sessions past their TTL
//!
//! # Example
//!
//! ```rust,ignore
//! use strand_session::{EvictionPolicy, ManagedSession, Manager, ManagerConfig};
//!
//! let config = ManagerConfig::default()
//!     .with_max_detached_sessions(1000)
//!     .with_eviction_policy(EvictionPolicy::Lru)
//!     .with_detached_ttl(Duration::from_secs(600));
//!
//! let manager = Manager::new(config)?;
//! manager.register(ManagedSession::new("session-1", "10.0.0.1"))?;
//! manager.on_disconnect("session-1", state_bytes);
//!
//! // Later, on reconnect:
//! let resumed = manager.register(ManagedSession::new("session-1", "10.0.0.1"))?;
//! let state = resumed.detached_payload;
//! ```

mod cleanup;
mod config;
mod error;
mod manager;
mod policy;
mod pool;
mod registry;
mod session;

pub use bytes::Bytes;
pub use cleanup::{CleanupScheduler, Sweep};
pub use config::{
    DEFAULT_CLEANUP_INTERVAL, DEFAULT_DETACHED_TTL, DEFAULT_MAX_DETACHED_SESSIONS,
    MAX_CONFIG_DURATION, ManagerConfig, SessionSettings,
};
pub use error::{Error, Result};
pub use manager::{Manager, ManagerStats};
pub use policy::{EvictionPolicy, RandomSource, ThreadRandom};
pub use pool::DetachedPool;
pub use registry::SessionRegistry;
pub use session::{ManagedSession, SessionState};
