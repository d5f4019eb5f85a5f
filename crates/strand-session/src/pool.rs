//! Ordered pool of detached sessions.
//!
//! Backed by an unbounded [`LruCache`], which pairs a linked ordering with a
//! hash index, so membership checks, promotion and removal by ID are O(1) and
//! the ordering and index can never disagree. Capacity is not enforced by the
//! cache itself; the manager applies its [`EvictionPolicy`] after each insert.

use std::time::Duration;

use bytes::Bytes;
use lru::LruCache;
use tokio::time::Instant;
use tracing::trace;

use crate::policy::{EvictionPolicy, RandomSource};
use crate::session::ManagedSession;

/// Detached sessions ordered front (most recently touched) to back.
#[derive(Debug)]
pub struct DetachedPool {
    entries: LruCache<String, ManagedSession>,
}

impl Default for DetachedPool {
    fn default() -> Self {
        Self::new()
    }
}

impl DetachedPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self {
            entries: LruCache::unbounded(),
        }
    }

    /// Number of detached sessions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check membership without changing the ordering.
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains(id)
    }

    /// Look up a session without changing the ordering.
    pub fn get(&self, id: &str) -> Option<&ManagedSession> {
        self.entries.peek(id)
    }

    /// Insert a session at the front.
    ///
    /// An existing entry with the same ID is replaced in place, never
    /// duplicated.
    pub fn insert(&mut self, session: ManagedSession) {
        let id = session.id.clone();
        if self.entries.put(id.clone(), session).is_some() {
            trace!(session_id = %id, "Replaced existing detached entry");
        }
    }

    /// Update the payload of an existing entry and move it to the front.
    ///
    /// Returns `false` if the ID is not detached.
    pub fn refresh(&mut self, id: &str, payload: Bytes, now: Instant) -> bool {
        match self.entries.get_mut(id) {
            Some(session) => {
                session.detached_payload = Some(payload);
                session.touch(now);
                true
            }
            None => false,
        }
    }

    /// Move an entry to the front and update its recency timestamp.
    ///
    /// Returns `false` if the ID is not detached.
    pub fn touch(&mut self, id: &str, now: Instant) -> bool {
        match self.entries.get_mut(id) {
            Some(session) => {
                session.touch(now);
                true
            }
            None => false,
        }
    }

    /// Remove an entry by ID.
    pub fn remove(&mut self, id: &str) -> Option<ManagedSession> {
        self.entries.pop(id)
    }

    /// Remove the entry chosen by `policy`.
    pub fn evict_one(
        &mut self,
        policy: EvictionPolicy,
        random: &dyn RandomSource,
    ) -> Option<ManagedSession> {
        if policy == EvictionPolicy::Lru {
            return self.entries.pop_lru().map(|(_, session)| session);
        }
        let idx = policy.select_victim(self.entries.iter().map(|(_, s)| s), random)?;
        let id = self.entries.iter().nth(idx).map(|(id, _)| id.clone())?;
        self.entries.pop(id.as_str())
    }

    /// Evict until the pool holds at most `max` entries.
    ///
    /// Called after every insert, so at most one entry is removed when the
    /// pool was within bounds beforehand.
    pub fn enforce_capacity(
        &mut self,
        max: usize,
        policy: EvictionPolicy,
        random: &dyn RandomSource,
    ) -> Vec<ManagedSession> {
        let mut evicted = Vec::new();
        while self.entries.len() > max {
            match self.evict_one(policy, random) {
                Some(session) => evicted.push(session),
                None => break,
            }
        }
        evicted
    }

    /// Remove every entry idle for longer than `ttl` as of `now`.
    pub fn drain_expired(&mut self, now: Instant, ttl: Duration) -> Vec<ManagedSession> {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, s)| s.idle_for(now) > ttl)
            .map(|(id, _)| id.clone())
            .collect();

        expired
            .iter()
            .filter_map(|id| self.entries.pop(id.as_str()))
            .collect()
    }

    /// IDs from front to back.
    pub fn ids(&self) -> Vec<String> {
        self.entries.iter().map(|(id, _)| id.clone()).collect()
    }

    /// Iterate over sessions from front to back.
    pub fn iter(&self) -> impl Iterator<Item = &ManagedSession> {
        self.entries.iter().map(|(_, s)| s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detached(id: &str) -> ManagedSession {
        let mut session = ManagedSession::new(id, "127.0.0.1");
        session.detached_payload = Some(Bytes::from(id.to_string()));
        session
    }

    fn pool_with(ids: &[&str]) -> DetachedPool {
        let mut pool = DetachedPool::new();
        for id in ids {
            pool.insert(detached(id));
        }
        pool
    }

    fn fixed(idx: usize) -> impl Fn(usize) -> usize + Send + Sync {
        move |_| idx
    }

    #[test]
    fn test_insert_orders_front_to_back() {
        let pool = pool_with(&["a", "b", "c"]);
        assert_eq!(pool.ids(), vec!["c", "b", "a"]);
        assert_eq!(pool.len(), 3);

        let ids: Vec<&str> = pool.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
    }

    #[test]
    fn test_insert_same_id_does_not_duplicate() {
        let mut pool = pool_with(&["a", "b"]);
        let mut again = detached("a");
        again.detached_payload = Some(Bytes::from_static(b"second"));
        pool.insert(again);

        assert_eq!(pool.len(), 2);
        assert_eq!(pool.ids(), vec!["a", "b"]);
        assert_eq!(
            pool.get("a").unwrap().detached_payload.as_deref(),
            Some(&b"second"[..])
        );
    }

    #[test]
    fn test_refresh_updates_in_place() {
        let mut pool = pool_with(&["a", "b"]);
        let later = Instant::now() + Duration::from_secs(5);

        assert!(pool.refresh("a", Bytes::from_static(b"p2"), later));
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.ids(), vec!["a", "b"]);

        let a = pool.get("a").unwrap();
        assert_eq!(a.detached_payload.as_deref(), Some(&b"p2"[..]));
        assert_eq!(a.last_touched_at, later);

        assert!(!pool.refresh("missing", Bytes::new(), later));
    }

    #[test]
    fn test_touch_promotes() {
        let mut pool = pool_with(&["a", "b", "c"]);
        assert!(pool.touch("a", Instant::now()));
        assert_eq!(pool.ids(), vec!["a", "c", "b"]);
        assert!(!pool.touch("zzz", Instant::now()));
    }

    #[test]
    fn test_get_does_not_promote() {
        let pool = pool_with(&["a", "b"]);
        assert!(pool.get("a").is_some());
        assert!(pool.contains("a"));
        assert_eq!(pool.ids(), vec!["b", "a"]);
    }

    #[test]
    fn test_evict_lru_removes_back() {
        let mut pool = pool_with(&["a", "b", "c"]);
        let victim = pool.evict_one(EvictionPolicy::Lru, &fixed(0)).unwrap();

        assert_eq!(victim.id, "a");
        assert_eq!(pool.len(), 2);
        assert!(!pool.contains("a"));
        assert_eq!(pool.ids(), vec!["c", "b"]);
    }

    #[test]
    fn test_evict_lru_ignores_random_and_follows_touch() {
        let mut pool = pool_with(&["a", "b", "c"]);
        pool.touch("a", Instant::now());

        let victim = pool.evict_one(EvictionPolicy::Lru, &fixed(0)).unwrap();
        assert_eq!(victim.id, "b");
        let victim = pool.evict_one(EvictionPolicy::Lru, &fixed(99)).unwrap();
        assert_eq!(victim.id, "c");
        assert_eq!(pool.ids(), vec!["a"]);
    }

    #[test]
    fn test_evict_random_counts_from_front() {
        let mut pool = pool_with(&["a", "b", "c"]);
        let victim = pool.evict_one(EvictionPolicy::Random, &fixed(1)).unwrap();
        assert_eq!(victim.id, "b");
        assert_eq!(pool.ids(), vec!["c", "a"]);
    }

    #[test]
    fn test_evict_random_clamps_to_back() {
        let mut pool = pool_with(&["a", "b", "c"]);
        let victim = pool.evict_one(EvictionPolicy::Random, &fixed(99)).unwrap();
        assert_eq!(victim.id, "a");
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_evict_empty_pool() {
        let mut pool = DetachedPool::new();
        assert!(pool.evict_one(EvictionPolicy::Lru, &fixed(0)).is_none());
    }

    #[test]
    fn test_enforce_capacity() {
        let mut pool = pool_with(&["a", "b", "c"]);
        assert!(
            pool.enforce_capacity(3, EvictionPolicy::Lru, &fixed(0))
                .is_empty()
        );

        pool.insert(detached("d"));
        let evicted = pool.enforce_capacity(3, EvictionPolicy::Lru, &fixed(0));
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].id, "a");
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn test_drain_expired() {
        let base = Instant::now();
        let mut pool = DetachedPool::new();
        pool.insert(detached("stale").with_created_at(base));
        pool.insert(detached("fresh").with_created_at(base + Duration::from_secs(50)));

        let expired = pool.drain_expired(base + Duration::from_secs(61), Duration::from_secs(60));

        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, "stale");
        assert_eq!(pool.ids(), vec!["fresh"]);
    }

    #[test]
    fn test_drain_expired_respects_touch() {
        let base = Instant::now();
        let mut pool = DetachedPool::new();
        pool.insert(detached("a").with_created_at(base));
        pool.touch("a", base + Duration::from_secs(30));

        let expired = pool.drain_expired(base + Duration::from_secs(61), Duration::from_secs(60));
        assert!(expired.is_empty());
        assert_eq!(pool.len(), 1);
    }
}
