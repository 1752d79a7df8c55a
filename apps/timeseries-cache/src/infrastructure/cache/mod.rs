//! In-Memory TTL Cache
//!
//! A key-value store with per-key expiry. Expired entries are invisible to
//! readers as soon as their TTL elapses and are physically removed either on
//! the read that notices them or by the periodic [`CacheSweeper`].
//!
//! # Usage
//!
//! ```ignore
//! let store = Arc::new(CacheStore::new(CacheConfig::default()));
//! tokio::spawn(CacheSweeper::new(Arc::clone(&store), cancel.clone()).run());
//!
//! store.set("AAPL-1min", entries);
//! let hit = store.get("AAPL-1min");
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::infrastructure::metrics;

/// Default time-to-live for a write (10 minutes).
pub const DEFAULT_TTL: Duration = Duration::from_secs(600);

/// Default interval between expiry sweeps (2 minutes).
pub const DEFAULT_CHECK_PERIOD: Duration = Duration::from_secs(120);

/// Longest sweep interval; larger configured periods are clamped to it.
pub const MAX_CHECK_PERIOD: Duration = Duration::from_secs(365 * 24 * 60 * 60);

// =============================================================================
// Configuration
// =============================================================================

/// Cache behavior settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// TTL applied by [`CacheStore::set`]. Zero means entries never expire.
    pub default_ttl: Duration,
    /// Interval between background sweeps. Zero disables the sweeper.
    pub check_period: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_TTL,
            check_period: DEFAULT_CHECK_PERIOD,
        }
    }
}

// =============================================================================
// Cache Store
// =============================================================================

#[derive(Debug, Clone)]
struct CacheSlot<V> {
    value: V,
    expires_at: Option<Instant>,
}

impl<V> CacheSlot<V> {
    fn is_expired_at(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }
}

/// Hit/miss counters and live key count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads that returned a value.
    pub hits: u64,
    /// Reads that found nothing or an expired value.
    pub misses: u64,
    /// Keys currently holding an unexpired value.
    pub keys: usize,
}

/// Thread-safe key-value store with per-entry expiry.
///
/// Values are cloned out on read, so large payloads should be stored behind
/// an `Arc`.
#[derive(Debug)]
pub struct CacheStore<V> {
    entries: RwLock<HashMap<String, CacheSlot<V>>>,
    config: CacheConfig,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V: Clone> CacheStore<V> {
    /// Create an empty store.
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Store configuration.
    #[must_use]
    pub const fn config(&self) -> CacheConfig {
        self.config
    }

    /// Store `value` under `key` with the default TTL.
    ///
    /// Always succeeds; the return value mirrors the classic cache API.
    pub fn set(&self, key: impl Into<String>, value: V) -> bool {
        self.set_with_ttl(key, value, self.config.default_ttl)
    }

    /// Store `value` under `key`, replacing any previous value and resetting
    /// its expiry to `ttl` from now. A zero `ttl`, or one too large to
    /// represent as a deadline, never expires.
    pub fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) -> bool {
        let expires_at = if ttl.is_zero() {
            None
        } else {
            Instant::now().checked_add(ttl)
        };
        let len = {
            let mut entries = self.entries.write();
            entries.insert(key.into(), CacheSlot { value, expires_at });
            entries.len()
        };
        metrics::set_cache_entries(len);
        true
    }

    /// Value stored under `key`, or `None` if it was never set or has expired.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        {
            let entries = self.entries.read();
            match entries.get(key) {
                Some(slot) if !slot.is_expired_at(now) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Some(slot.value.clone());
                }
                Some(_) => {}
                None => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
            }
        }

        self.evict_if_expired(key, now);
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Whether `key` holds an unexpired value. Does not touch hit/miss stats.
    pub fn has(&self, key: &str) -> bool {
        let now = Instant::now();
        self.entries
            .read()
            .get(key)
            .is_some_and(|slot| !slot.is_expired_at(now))
    }

    /// Remove `key`. Returns 1 if an unexpired value was removed, else 0.
    pub fn delete(&self, key: &str) -> usize {
        let now = Instant::now();
        let (removed, len) = {
            let mut entries = self.entries.write();
            let removed = entries.remove(key);
            (removed, entries.len())
        };
        metrics::set_cache_entries(len);
        usize::from(removed.is_some_and(|slot| !slot.is_expired_at(now)))
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.entries.write().clear();
        metrics::set_cache_entries(0);
    }

    /// Remove every entry without blocking.
    ///
    /// Returns `false` if the lock is currently held elsewhere. Used on the
    /// fatal-error path, where the failing thread may own the lock.
    pub fn try_clear(&self) -> bool {
        let Some(mut entries) = self.entries.try_write() else {
            return false;
        };
        entries.clear();
        drop(entries);
        metrics::set_cache_entries(0);
        true
    }

    /// Physically remove expired entries. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let (removed, len) = {
            let mut entries = self.entries.write();
            let before = entries.len();
            entries.retain(|_, slot| !slot.is_expired_at(now));
            (before - entries.len(), entries.len())
        };
        if removed > 0 {
            metrics::record_cache_expired(removed as u64);
        }
        metrics::set_cache_entries(len);
        removed
    }

    /// Number of unexpired entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .values()
            .filter(|slot| !slot.is_expired_at(now))
            .count()
    }

    /// Whether no unexpired entries remain.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys holding unexpired values, in no particular order.
    pub fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        self.entries
            .read()
            .iter()
            .filter(|(_, slot)| !slot.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Snapshot of hit/miss counters and live key count.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            keys: self.len(),
        }
    }

    fn evict_if_expired(&self, key: &str, now: Instant) {
        let mut entries = self.entries.write();
        // Re-check under the write lock: a writer may have refreshed the key.
        if entries.get(key).is_some_and(|slot| slot.is_expired_at(now)) {
            entries.remove(key);
            metrics::record_cache_expired(1);
            metrics::set_cache_entries(entries.len());
        }
    }
}

// =============================================================================
// Expiry Sweeper
// =============================================================================

/// Background task that periodically removes expired entries.
pub struct CacheSweeper<V> {
    store: Arc<CacheStore<V>>,
    period: Duration,
    cancel: CancellationToken,
}

impl<V> CacheSweeper<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a sweeper using the store's configured check period, clamped
    /// to [`MAX_CHECK_PERIOD`].
    #[must_use]
    pub fn new(store: Arc<CacheStore<V>>, cancel: CancellationToken) -> Self {
        let period = store.config().check_period.min(MAX_CHECK_PERIOD);
        Self {
            store,
            period,
            cancel,
        }
    }

    /// Run until cancelled. Returns immediately if the period is zero.
    pub async fn run(self) {
        if self.period.is_zero() {
            tracing::info!("Cache sweeper disabled");
            return;
        }

        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        tracing::debug!(period_secs = self.period.as_secs(), "Cache sweeper started");

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    tracing::debug!("Cache sweeper cancelled");
                    break;
                }
                _ = interval.tick() => {
                    let removed = self.store.sweep_expired();
                    if removed > 0 {
                        tracing::debug!(removed, "Expired cache entries swept");
                    }
                }
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn store() -> CacheStore<String> {
        CacheStore::new(CacheConfig::default())
    }

    #[test]
    fn set_and_get() {
        let cache = store();
        assert!(cache.set("testKey", "testValue".to_string()));
        assert_eq!(cache.get("testKey").as_deref(), Some("testValue"));
    }

    #[test]
    fn missing_key_is_absent() {
        let cache = store();
        assert!(cache.get("missingKey").is_none());
        assert!(!cache.has("missingKey"));
    }

    #[test]
    fn set_overwrites() {
        let cache = store();
        cache.set("k", "first".to_string());
        cache.set("k", "second".to_string());
        assert_eq!(cache.get("k").as_deref(), Some("second"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn delete_reports_count() {
        let cache = store();
        cache.set("testKey", "testValue".to_string());
        assert_eq!(cache.delete("testKey"), 1);
        assert!(cache.get("testKey").is_none());
        assert_eq!(cache.delete("testKey"), 0);
        assert_eq!(cache.delete("neverSet"), 0);
    }

    #[test]
    fn clear_removes_everything() {
        let cache = store();
        cache.set("key1", "value1".to_string());
        cache.set("key2", "value2".to_string());
        cache.clear();
        assert!(cache.get("key1").is_none());
        assert!(cache.get("key2").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn try_clear_yields_when_locked() {
        let cache = store();
        cache.set("k", "v".to_string());
        {
            let _guard = cache.entries.read();
            assert!(!cache.try_clear());
        }
        assert!(cache.try_clear());
        assert!(cache.is_empty());
    }

    #[test]
    fn stats_count_hits_and_misses() {
        let cache = store();
        cache.set("k", "v".to_string());
        let _ = cache.get("k");
        let _ = cache.get("k");
        let _ = cache.get("nope");

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.keys, 1);
    }

    #[test]
    fn keys_lists_live_entries() {
        let cache = store();
        cache.set("a", "1".to_string());
        cache.set("b", "2".to_string());
        let mut keys = cache.keys();
        keys.sort();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn read_past_ttl_is_absent_before_sweep() {
        let cache = store();
        cache.set_with_ttl("k", "v".to_string(), Duration::from_secs(10));

        tokio::time::advance(Duration::from_secs(9)).await;
        assert_eq!(cache.get("k").as_deref(), Some("v"));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.get("k").is_none());
        // The read evicted it physically as well.
        assert!(cache.entries.read().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn set_resets_expiry() {
        let cache = store();
        cache.set_with_ttl("k", "v1".to_string(), Duration::from_secs(10));
        tokio::time::advance(Duration::from_secs(8)).await;
        cache.set_with_ttl("k", "v2".to_string(), Duration::from_secs(10));
        tokio::time::advance(Duration::from_secs(8)).await;
        assert_eq!(cache.get("k").as_deref(), Some("v2"));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_ttl_never_expires() {
        let cache = store();
        cache.set_with_ttl("k", "v".to_string(), Duration::ZERO);
        tokio::time::advance(Duration::from_secs(365 * 24 * 3600)).await;
        assert_eq!(cache.get("k").as_deref(), Some("v"));
        assert_eq!(cache.sweep_expired(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn unrepresentable_ttl_never_expires() {
        let config = CacheConfig {
            default_ttl: Duration::from_secs(u64::MAX),
            check_period: Duration::from_secs(u64::MAX),
        };
        let cache = Arc::new(CacheStore::new(config));
        assert!(cache.set("k", "v".to_string()));
        assert!(cache.set_with_ttl("max", "w".to_string(), Duration::MAX));

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(CacheSweeper::new(Arc::clone(&cache), cancel.clone()).run());

        tokio::time::advance(Duration::from_secs(10 * 365 * 24 * 3600)).await;
        assert_eq!(cache.get("k").as_deref(), Some("v"));
        assert_eq!(cache.get("max").as_deref(), Some("w"));
        assert_eq!(cache.sweep_expired(), 0);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn default_ttl_applies_to_set() {
        let cache = store();
        cache.set("k", "v".to_string());
        tokio::time::advance(DEFAULT_TTL - Duration::from_secs(1)).await;
        assert!(cache.has("k"));
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(!cache.has("k"));
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_removes_only_expired() {
        let cache = store();
        cache.set_with_ttl("short", "a".to_string(), Duration::from_secs(1));
        cache.set_with_ttl("long", "b".to_string(), Duration::from_secs(100));

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(cache.sweep_expired(), 1);
        assert_eq!(cache.entries.read().len(), 1);
        assert!(cache.has("long"));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entry_does_not_count_as_deleted() {
        let cache = store();
        cache.set_with_ttl("k", "v".to_string(), Duration::from_secs(1));
        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.delete("k"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_runs_on_interval() {
        let config = CacheConfig {
            default_ttl: Duration::from_secs(1),
            check_period: Duration::from_secs(2),
        };
        let cache = Arc::new(CacheStore::new(config));
        cache.set("k", "v".to_string());

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(CacheSweeper::new(Arc::clone(&cache), cancel.clone()).run());

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(cache.entries.read().is_empty());

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn sweeper_stops_on_cancel() {
        let cache: Arc<CacheStore<String>> = Arc::new(store());
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(CacheSweeper::new(cache, cancel.clone()).run());

        cancel.cancel();
        let result = tokio::time::timeout(Duration::from_millis(100), handle).await;
        assert!(result.is_ok(), "sweeper should stop on cancellation");
    }

    #[tokio::test]
    async fn sweeper_disabled_with_zero_period() {
        let config = CacheConfig {
            default_ttl: DEFAULT_TTL,
            check_period: Duration::ZERO,
        };
        let cache: Arc<CacheStore<String>> = Arc::new(CacheStore::new(config));
        let handle = tokio::spawn(CacheSweeper::new(cache, CancellationToken::new()).run());

        let result = tokio::time::timeout(Duration::from_millis(100), handle).await;
        assert!(result.is_ok(), "disabled sweeper should return immediately");
    }

    proptest! {
        #[test]
        fn set_then_get_returns_value(
            key in "[A-Za-z0-9-]{1,24}",
            value in any::<i64>(),
            ttl_secs in 0u64..1_000_000,
        ) {
            let cache = CacheStore::new(CacheConfig::default());
            prop_assert!(cache.set_with_ttl(key.clone(), value, Duration::from_secs(ttl_secs)));
            prop_assert_eq!(cache.get(&key), Some(value));
        }
    }
}
