//! In-memory counter store for tests and single-instance deployments.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

use super::store::{CounterStore, StoreError};

/// Purge expired entries every N increments to bound memory growth.
const PURGE_INTERVAL: u64 = 1000;

/// A counter together with its optional expiry deadline.
#[derive(Debug, Clone, Copy)]
struct CounterEntry {
    count: u64,
    expires_at: Option<Instant>,
}

impl CounterEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }
}

/// Process-local implementation of [`CounterStore`].
///
/// Mirrors the Redis semantics the limiter relies on: `INCR` creates a key
/// without expiry, `PEXPIRE` arms a deadline, and an expired key reads as
/// absent. Deadlines use tokio's clock so tests can pause and advance time.
#[derive(Default)]
pub struct InMemoryCounterStore {
    counters: Mutex<HashMap<String, CounterEntry>>,
    increments: AtomicU64,
}

impl InMemoryCounterStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently held, expired or not.
    pub fn len(&self) -> usize {
        self.counters.lock().len()
    }

    /// Whether the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.counters.lock().is_empty()
    }

    /// Drop every entry whose deadline has passed.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        let mut counters = self.counters.lock();
        let before = counters.len();
        counters.retain(|_, entry| !entry.is_expired(now));
        trace!(purged = before - counters.len(), "Purged expired counters");
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn increment(&self, key: &str) -> Result<u64, StoreError> {
        let seen = self.increments.fetch_add(1, Ordering::Relaxed);
        if seen > 0 && seen % PURGE_INTERVAL == 0 {
            self.purge_expired();
        }

        let now = Instant::now();
        let mut counters = self.counters.lock();
        let entry = counters.entry(key.to_string()).or_insert(CounterEntry {
            count: 0,
            expires_at: None,
        });

        if entry.is_expired(now) {
            *entry = CounterEntry {
                count: 0,
                expires_at: None,
            };
        }

        entry.count += 1;
        Ok(entry.count)
    }

    async fn get(&self, key: &str) -> Result<Option<u64>, StoreError> {
        let now = Instant::now();
        let counters = self.counters.lock();
        Ok(counters
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.count))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        let now = Instant::now();
        let mut counters = self.counters.lock();
        if let Some(entry) = counters.get_mut(key).filter(|entry| !entry.is_expired(now)) {
            let deadline = now
                .checked_add(ttl)
                .ok_or_else(|| StoreError::Command(format!("expiry of {ttl:?} is out of range")))?;
            entry.expires_at = Some(deadline);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::LimitPolicy;

    #[tokio::test]
    async fn test_increment_creates_at_one() {
        let store = InMemoryCounterStore::new();

        assert_eq!(store.get("a").await.unwrap(), None);
        assert_eq!(store.increment("a").await.unwrap(), 1);
        assert_eq!(store.increment("a").await.unwrap(), 2);
        assert_eq!(store.get("a").await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let store = InMemoryCounterStore::new();

        store.increment("a").await.unwrap();
        store.increment("a").await.unwrap();
        store.increment("b").await.unwrap();

        assert_eq!(store.get("a").await.unwrap(), Some(2));
        assert_eq!(store.get("b").await.unwrap(), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_key_restarts_at_one() {
        let store = InMemoryCounterStore::new();

        store.increment("a").await.unwrap();
        store.increment("a").await.unwrap();
        store.expire("a", Duration::from_secs(5)).await.unwrap();

        tokio::time::advance(Duration::from_secs(6)).await;

        assert_eq!(store.get("a").await.unwrap(), None);
        assert_eq!(store.increment("a").await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_key_without_expiry_persists() {
        let store = InMemoryCounterStore::new();

        store.increment("a").await.unwrap();
        tokio::time::advance(Duration::from_secs(3600)).await;

        assert_eq!(store.get("a").await.unwrap(), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expire_on_absent_key_is_noop() {
        let store = InMemoryCounterStore::new();

        store.expire("missing", Duration::from_secs(1)).await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_unrepresentable_expiry_is_an_error() {
        let store = InMemoryCounterStore::new();
        store.increment("a").await.unwrap();

        let result = store.expire("a", Duration::MAX).await;
        assert!(matches!(result, Err(StoreError::Command(_))));
        assert_eq!(store.get("a").await.unwrap(), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_drops_only_expired() {
        let store = InMemoryCounterStore::new();

        store.increment("short").await.unwrap();
        store.expire("short", Duration::from_secs(1)).await.unwrap();
        store.increment("long").await.unwrap();
        store.expire("long", Duration::from_secs(60)).await.unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;
        store.purge_expired();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("long").await.unwrap(), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hit_arms_expiry_within_threshold() {
        let store = InMemoryCounterStore::new();
        let policy = LimitPolicy::new(2, Duration::from_secs(10));

        assert_eq!(store.hit("a", &policy).await.unwrap(), 1);
        assert_eq!(store.hit("a", &policy).await.unwrap(), 2);

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(store.hit("a", &policy).await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hit_does_not_rearm_beyond_threshold() {
        let store = InMemoryCounterStore::new();
        let policy = LimitPolicy::new(1, Duration::from_secs(10));

        store.hit("a", &policy).await.unwrap();
        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(store.hit("a", &policy).await.unwrap(), 2);

        // The window armed by the first hit still closes on schedule.
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(store.hit("a", &policy).await.unwrap(), 1);
    }
}
