//! Bounded cache with TTL expiry and LRU eviction under a byte budget
//!
//! All entry and size bookkeeping sits behind a single `parking_lot::Mutex`
//! so the budget invariant holds after every public call. Hit and miss
//! counters are lock-free atomics. Compute closures passed to
//! [`CacheManager::get_or_compute`] run outside the lock; only the
//! resulting store is serialized with other mutations.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::config::{CacheConfig, OversizePolicy};
use super::entry::{CacheEntry, RecencyKey};
use crate::error::{PerfError, Result};
use crate::utils::{Clock, SizeEstimate, SystemClock};

/// Point-in-time statistics for one cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Cache name
    pub name: String,
    /// Number of live entries
    pub entries: usize,
    /// Sum of entry sizes in bytes
    pub size_bytes: usize,
    /// Configured byte budget
    pub max_size_bytes: u64,
    /// Successful reads
    pub hits: u64,
    /// Reads that found nothing or an expired entry
    pub misses: u64,
    /// `hits / (hits + misses)`, 0 when there were no reads
    pub hit_rate: f64,
    /// Configured time-to-live
    pub ttl_seconds: u64,
}

impl CacheStats {
    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / (1024.0 * 1024.0)
    }
}

/// Mutable state guarded by the manager's lock
struct CacheInner<V> {
    entries: HashMap<String, CacheEntry<V>>,
    /// Eviction order, least recently accessed first
    recency: BTreeMap<RecencyKey, String>,
    size_bytes: usize,
    next_seq: u64,
}

impl<V> CacheInner<V> {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            recency: BTreeMap::new(),
            size_bytes: 0,
            next_seq: 0,
        }
    }

    fn remove(&mut self, key: &str) -> Option<CacheEntry<V>> {
        let entry = self.entries.remove(key)?;
        self.recency.remove(&entry.recency_key());
        self.size_bytes -= entry.size_bytes;
        Some(entry)
    }

    fn insert(&mut self, entry: CacheEntry<V>) {
        self.size_bytes += entry.size_bytes;
        self.recency.insert(entry.recency_key(), entry.key.clone());
        self.entries.insert(entry.key.clone(), entry);
    }

    fn pop_lru(&mut self) -> Option<CacheEntry<V>> {
        let (_, key) = self.recency.pop_first()?;
        let entry = self.entries.remove(&key)?;
        self.size_bytes -= entry.size_bytes;
        Some(entry)
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.recency.clear();
        self.size_bytes = 0;
    }

    fn remove_where(&mut self, mut pred: impl FnMut(&CacheEntry<V>) -> bool) -> Vec<CacheEntry<V>> {
        let doomed: Vec<String> = self
            .entries
            .values()
            .filter(|entry| pred(*entry))
            .map(|entry| entry.key.clone())
            .collect();
        doomed.iter().filter_map(|key| self.remove(key)).collect()
    }
}

/// A named, bounded key-value store with TTL expiry and LRU eviction
pub struct CacheManager<V> {
    name: String,
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<CacheInner<V>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V> CacheManager<V> {
    /// Create a cache on the system clock
    pub fn new(name: impl Into<String>, config: CacheConfig) -> Self {
        Self::with_clock(name, config, Arc::new(SystemClock))
    }

    /// Create a cache reading time from `clock`
    pub fn with_clock(name: impl Into<String>, config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            name: name.into(),
            config,
            clock,
            inner: Mutex::new(CacheInner::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Current time on this cache's clock, comparable with entry timestamps
    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    fn ttl(&self) -> Duration {
        self.config.ttl()
    }

    fn budget(&self) -> usize {
        usize::try_from(self.config.max_size_bytes).unwrap_or(usize::MAX)
    }

    /// Remove an entry. Returns whether one was present.
    pub fn invalidate(&self, key: &str) -> bool {
        let removed = self.inner.lock().remove(key).is_some();
        if removed {
            debug!(cache = %self.name, key = %key, "Invalidated cache entry");
        }
        removed
    }

    /// Remove every entry. Hit and miss counters are kept.
    pub fn clear(&self) {
        self.inner.lock().clear();
        debug!(cache = %self.name, "Cleared cache");
    }

    /// Whether a live, unexpired entry exists. Does not count as an access.
    pub fn contains(&self, key: &str) -> bool {
        let now = self.clock.now();
        self.inner
            .lock()
            .entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired(now, self.ttl()))
    }

    /// Number of stored entries, expired ones included until they are touched or purged
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sum of the sizes of stored entries
    pub fn size_bytes(&self) -> usize {
        self.inner.lock().size_bytes
    }

    /// Drop every entry older than the configured TTL
    pub fn purge_expired(&self) -> usize {
        self.evict_older_than(self.ttl())
    }

    /// Drop every entry inserted more than `max_age` ago
    pub fn evict_older_than(&self, max_age: Duration) -> usize {
        let now = self.clock.now();
        let removed = self
            .inner
            .lock()
            .remove_where(|entry| entry.is_expired(now, max_age));
        if !removed.is_empty() {
            debug!(
                cache = %self.name,
                removed = removed.len(),
                max_age_secs = max_age.as_secs_f64(),
                "Evicted aged cache entries"
            );
        }
        removed.len()
    }

    /// Current statistics
    pub fn stats(&self) -> CacheStats {
        let (entries, size_bytes) = {
            let inner = self.inner.lock();
            (inner.entries.len(), inner.size_bytes)
        };
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            hits as f64 / total as f64
        } else {
            0.0
        };

        CacheStats {
            name: self.name.clone(),
            entries,
            size_bytes,
            max_size_bytes: self.config.max_size_bytes,
            hits,
            misses,
            hit_rate,
            ttl_seconds: self.config.ttl_seconds,
        }
    }

    /// Human-readable statistics block
    pub fn report(&self) -> String {
        let stats = self.stats();
        format!(
            "Cache '{}':\n  Entries: {}\n  Size: {:.2}MB\n  Hits: {}\n  Misses: {}\n  Hit Rate: {:.1}%",
            stats.name,
            stats.entries,
            stats.size_mb(),
            stats.hits,
            stats.misses,
            stats.hit_rate * 100.0
        )
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }
}

impl<V: Clone> CacheManager<V> {
    /// Look up a live entry.
    ///
    /// A hit refreshes the entry's recency and access count. An entry
    /// past its TTL is removed and the read counts as a miss.
    pub fn get(&self, key: &str) -> Option<V> {
        if !self.config.enabled {
            self.record_miss();
            return None;
        }

        let now = self.clock.now();
        let ttl = self.ttl();
        let mut inner = self.inner.lock();

        match inner.entries.get(key).map(|entry| entry.is_expired(now, ttl)) {
            None => {
                drop(inner);
                self.record_miss();
                return None;
            }
            Some(true) => {
                if let Some(entry) = inner.remove(key) {
                    debug!(
                        cache = %self.name,
                        key = %key,
                        age_secs = entry.age(now).as_secs_f64(),
                        "Expired cache entry"
                    );
                }
                drop(inner);
                self.record_miss();
                return None;
            }
            Some(false) => {}
        }

        let CacheInner { entries, recency, .. } = &mut *inner;
        let entry = entries.get_mut(key)?;
        recency.remove(&entry.recency_key());
        entry.touch(now);
        recency.insert(entry.recency_key(), entry.key.clone());
        let value = entry.value.clone();
        drop(inner);

        self.hits.fetch_add(1, Ordering::Relaxed);
        Some(value)
    }

    /// Snapshot of an entry and its bookkeeping, without counting an access
    pub fn peek_entry(&self, key: &str) -> Option<CacheEntry<V>> {
        let now = self.clock.now();
        self.inner
            .lock()
            .entries
            .get(key)
            .filter(|entry| !entry.is_expired(now, self.ttl()))
            .cloned()
    }
}

impl<V: SizeEstimate> CacheManager<V> {
    /// Insert or replace an entry, evicting least recently accessed
    /// entries until the new value fits.
    ///
    /// A value larger than the whole budget is handled according to the
    /// configured [`OversizePolicy`].
    pub fn set(&self, key: impl Into<String>, value: V) -> Result<()> {
        if !self.config.enabled {
            return Ok(());
        }

        let key = key.into();
        let size = value.estimated_size();
        let budget = self.budget();

        if size > budget && self.config.oversize_policy == OversizePolicy::Reject {
            warn!(
                cache = %self.name,
                key = %key,
                size_bytes = size,
                max_size_bytes = budget,
                "Rejected entry larger than the cache budget"
            );
            return Err(PerfError::EntryTooLarge {
                key,
                size_bytes: size,
                max_size_bytes: budget,
            });
        }

        let now = self.clock.now();
        let mut inner = self.inner.lock();
        inner.remove(&key);

        while inner.size_bytes.saturating_add(size) > budget {
            match inner.pop_lru() {
                Some(evicted) => debug!(
                    cache = %self.name,
                    key = %evicted.key,
                    size_bytes = evicted.size_bytes,
                    "Evicted least recently used entry"
                ),
                None => break,
            }
        }

        if size > budget {
            warn!(
                cache = %self.name,
                key = %key,
                size_bytes = size,
                max_size_bytes = budget,
                "Admitted entry larger than the cache budget"
            );
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.insert(CacheEntry::new(key, value, size, now, seq));
        Ok(())
    }
}

impl<V: Clone + SizeEstimate> CacheManager<V> {
    /// Return the cached value, or run `compute` on a miss and store its result.
    ///
    /// `compute` runs without the cache lock held, so two concurrent
    /// misses on the same key may both compute; the later store wins.
    /// An error from `compute` is returned as-is and nothing is stored.
    /// If the store itself is rejected, the computed value is still
    /// returned.
    pub fn get_or_compute<E, F>(&self, key: &str, compute: F) -> std::result::Result<V, E>
    where
        F: FnOnce() -> std::result::Result<V, E>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }

        let value = compute()?;
        if let Err(err) = self.set(key, value.clone()) {
            warn!(cache = %self.name, key = %key, error = %err, "Computed value was not cached");
        }
        Ok(value)
    }

    /// Infallible form of [`get_or_compute`](Self::get_or_compute)
    pub fn get_or_insert_with<F>(&self, key: &str, compute: F) -> V
    where
        F: FnOnce() -> V,
    {
        match self.get_or_compute::<std::convert::Infallible, _>(key, || Ok(compute())) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::ManualClock;

    fn manual_cache(max_bytes: u64, ttl: u64) -> (CacheManager<Vec<u8>>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let cache = CacheManager::with_clock(
            "test",
            CacheConfig::with_max_size_bytes(max_bytes, ttl),
            clock.clone(),
        );
        (cache, clock)
    }

    #[test]
    fn test_set_then_get() {
        let (cache, _) = manual_cache(1024, 60);
        cache.set("a", vec![1, 2, 3]).unwrap();
        assert_eq!(cache.get("a"), Some(vec![1, 2, 3]));
        assert_eq!(cache.size_bytes(), 3);
    }

    #[test]
    fn test_replace_refunds_old_size() {
        let (cache, _) = manual_cache(1024, 60);
        cache.set("a", vec![0; 10]).unwrap();
        cache.set("a", vec![0; 4]).unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.size_bytes(), 4);
    }

    #[test]
    fn test_lru_eviction_under_budget() {
        let (cache, clock) = manual_cache(100, 3600);
        cache.set("a", vec![0; 40]).unwrap();
        clock.advance_secs(1);
        cache.set("b", vec![0; 40]).unwrap();
        clock.advance_secs(1);
        cache.get("b");
        clock.advance_secs(1);
        cache.set("c", vec![0; 40]).unwrap();

        assert!(!cache.contains("a"));
        assert!(cache.contains("b"));
        assert!(cache.contains("c"));
        assert_eq!(cache.size_bytes(), 80);
    }

    #[test]
    fn test_hit_protects_entry_from_eviction() {
        let (cache, clock) = manual_cache(100, 3600);
        cache.set("a", vec![0; 40]).unwrap();
        clock.advance_secs(1);
        cache.set("b", vec![0; 40]).unwrap();
        clock.advance_secs(1);
        cache.get("a");
        clock.advance_secs(1);
        cache.set("c", vec![0; 40]).unwrap();

        assert!(cache.contains("a"));
        assert!(!cache.contains("b"));
    }

    #[test]
    fn test_equal_access_times_evict_earliest_insert() {
        let (cache, _) = manual_cache(100, 3600);
        cache.set("a", vec![0; 40]).unwrap();
        cache.set("b", vec![0; 40]).unwrap();
        cache.set("c", vec![0; 40]).unwrap();
        assert!(!cache.contains("a"));
        assert!(cache.contains("b"));
    }

    #[test]
    fn test_ttl_expiry_counts_as_miss() {
        let (cache, clock) = manual_cache(1024, 10);
        cache.set("a", vec![1]).unwrap();
        clock.advance_secs(11);
        assert_eq!(cache.get("a"), None);

        let stats = cache.stats();
        assert_eq!(stats.entries, 0);
        assert_eq!(stats.size_bytes, 0);
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_entry_alive_at_exact_ttl() {
        let (cache, clock) = manual_cache(1024, 10);
        cache.set("a", vec![1]).unwrap();
        clock.advance_secs(10);
        assert_eq!(cache.get("a"), Some(vec![1]));
    }

    #[test]
    fn test_oversize_admitted_by_default() {
        let (cache, _) = manual_cache(100, 60);
        cache.set("a", vec![0; 30]).unwrap();
        cache.set("huge", vec![0; 150]).unwrap();
        assert_eq!(cache.len(), 1);
        assert!(cache.contains("huge"));
        assert_eq!(cache.size_bytes(), 150);
    }

    #[test]
    fn test_oversize_rejected_leaves_cache_untouched() {
        let clock = Arc::new(ManualClock::new());
        let config = CacheConfig::with_max_size_bytes(100, 60)
            .with_oversize_policy(OversizePolicy::Reject);
        let cache: CacheManager<Vec<u8>> = CacheManager::with_clock("reject", config, clock);
        cache.set("a", vec![0; 30]).unwrap();

        let err = cache.set("a", vec![0; 150]).unwrap_err();
        assert!(matches!(err, PerfError::EntryTooLarge { size_bytes: 150, .. }));
        assert_eq!(cache.get("a"), Some(vec![0; 30]));
    }

    #[test]
    fn test_get_or_compute_error_leaves_cache_unchanged() {
        let (cache, _) = manual_cache(1024, 60);
        let result: std::result::Result<Vec<u8>, &str> = cache.get_or_compute("a", || Err("boom"));
        assert_eq!(result, Err("boom"));
        assert!(!cache.contains("a"));
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_get_or_compute_runs_once_then_hits() {
        let (cache, _) = manual_cache(1024, 60);
        let mut calls = 0;
        for _ in 0..3 {
            let value = cache.get_or_insert_with("k", || {
                calls += 1;
                vec![7; 2]
            });
            assert_eq!(value, vec![7, 7]);
        }
        assert_eq!(calls, 1);
        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_disabled_cache_stores_nothing() {
        let config = CacheConfig::with_max_size_bytes(1024, 60).with_enabled(false);
        let cache: CacheManager<String> = CacheManager::new("off", config);
        cache.set("a", "x".to_string()).unwrap();
        assert_eq!(cache.get("a"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clear_keeps_counters() {
        let (cache, _) = manual_cache(1024, 60);
        cache.set("a", vec![1]).unwrap();
        cache.get("a");
        cache.get("missing");
        cache.clear();

        let stats = cache.stats();
        assert_eq!(stats.entries, 0);
        assert_eq!(stats.size_bytes, 0);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_hit_rate_zero_without_reads() {
        let (cache, _) = manual_cache(1024, 60);
        assert_eq!(cache.stats().hit_rate, 0.0);
    }

    #[test]
    fn test_peek_does_not_count() {
        let (cache, _) = manual_cache(1024, 60);
        cache.set("a", vec![1]).unwrap();
        let entry = cache.peek_entry("a").unwrap();
        assert_eq!(entry.access_count, 0);
        assert_eq!(entry.size_bytes, 1);
        assert_eq!(cache.stats().hits, 0);
    }

    #[test]
    fn test_purge_and_age_eviction() {
        let (cache, clock) = manual_cache(1024, 10);
        cache.set("old", vec![1]).unwrap();
        clock.advance_secs(6);
        cache.set("new", vec![2]).unwrap();

        assert_eq!(cache.evict_older_than(Duration::from_secs(5)), 1);
        assert!(cache.contains("new"));

        clock.advance_secs(11);
        assert_eq!(cache.purge_expired(), 1);
        assert!(cache.is_empty());
        assert_eq!(cache.size_bytes(), 0);
    }

    #[test]
    fn test_report_format() {
        let (cache, _) = manual_cache(1024, 60);
        cache.set("a", vec![1]).unwrap();
        cache.get("a");
        let report = cache.report();
        assert!(report.starts_with("Cache 'test':"));
        assert!(report.contains("Entries: 1"));
        assert!(report.contains("Hit Rate: 100.0%"));
    }
}
