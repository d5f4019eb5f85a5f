//! Eviction policies for the detached pool.
//!
//! A policy is chosen once, at construction, and only ever answers one
//! question: which position in the pool (counted from the front, the most
//! recently touched end) should be removed to get back under capacity.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::Deserialize;
use tokio::time::Instant;

use crate::error::Error;
use crate::session::ManagedSession;

/// Strategy used to pick a victim when the detached pool is over capacity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionPolicy {
    /// Evict the least recently touched session (the back of the pool).
    #[default]
    Lru,
    /// Evict the session with the earliest creation time.
    Oldest,
    /// Evict a session at a position drawn from the injected [`RandomSource`].
    Random,
}

impl EvictionPolicy {
    /// Pick the index of the session to evict.
    ///
    /// `sessions` yields the pool front to back. Returns `None` only for an
    /// empty pool.
    pub fn select_victim<'a, I>(&self, sessions: I, random: &dyn RandomSource) -> Option<usize>
    where
        I: ExactSizeIterator<Item = &'a ManagedSession>,
    {
        let len = sessions.len();
        if len == 0 {
            return None;
        }

        match self {
            EvictionPolicy::Lru => Some(len - 1),
            EvictionPolicy::Oldest => {
                // Strict comparison keeps the earliest pool position on ties.
                let mut victim = 0;
                let mut oldest: Option<Instant> = None;
                for (idx, session) in sessions.enumerate() {
                    if oldest.is_none_or(|ts| session.created_at < ts) {
                        oldest = Some(session.created_at);
                        victim = idx;
                    }
                }
                Some(victim)
            }
            EvictionPolicy::Random => Some(random.next_index(len).min(len - 1)),
        }
    }

    /// Lowercase name, as accepted by [`FromStr`] and settings files.
    pub fn as_str(&self) -> &'static str {
        match self {
            EvictionPolicy::Lru => "lru",
            EvictionPolicy::Oldest => "oldest",
            EvictionPolicy::Random => "random",
        }
    }
}

impl fmt::Display for EvictionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EvictionPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lru" => Ok(EvictionPolicy::Lru),
            "oldest" => Ok(EvictionPolicy::Oldest),
            "random" => Ok(EvictionPolicy::Random),
            other => Err(Error::InvalidConfig(format!(
                "unknown eviction policy '{other}' (expected lru, oldest or random)"
            ))),
        }
    }
}

/// Source of random positions for [`EvictionPolicy::Random`].
///
/// Injected into the manager rather than read from a global so tests can pin
/// the draw. Implementations may return anything; out-of-range values are
/// clamped to the back of the pool by the caller.
pub trait RandomSource: Send + Sync {
    /// Return an index in `0..n`. `n` is always at least 1.
    fn next_index(&self, n: usize) -> usize;
}

impl<F> RandomSource for F
where
    F: Fn(usize) -> usize + Send + Sync,
{
    fn next_index(&self, n: usize) -> usize {
        self(n)
    }
}

/// Default [`RandomSource`] backed by the thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_index(&self, n: usize) -> usize {
        if n == 0 {
            return 0;
        }
        rand::rng().random_range(0..n)
    }
}
