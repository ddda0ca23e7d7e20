//! Cache entries

use std::time::{Duration, Instant};

/// A stored value with its bookkeeping
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// Key the entry is stored under
    pub key: String,
    /// The cached value
    pub value: V,
    /// When the entry was inserted (or last replaced by `set`)
    pub inserted_at: Instant,
    /// When the entry was last read successfully
    pub last_accessed: Instant,
    /// Number of successful reads
    pub access_count: u64,
    /// Estimated footprint, fixed at insertion
    pub size_bytes: usize,
    /// Insertion sequence number, unique within one manager
    pub(crate) seq: u64,
}

impl<V> CacheEntry<V> {
    pub(crate) fn new(key: String, value: V, size_bytes: usize, now: Instant, seq: u64) -> Self {
        Self {
            key,
            value,
            inserted_at: now,
            last_accessed: now,
            access_count: 0,
            size_bytes,
            seq,
        }
    }

    /// Age of this entry at `now`
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.inserted_at)
    }

    /// An entry is expired once it is strictly older than `ttl`
    pub fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        self.age(now) > ttl
    }

    /// Record a successful read
    pub(crate) fn touch(&mut self, now: Instant) {
        self.last_accessed = now;
        self.access_count += 1;
    }

    /// Position in eviction order: least recently accessed first,
    /// then earliest inserted.
    pub(crate) fn recency_key(&self) -> RecencyKey {
        RecencyKey {
            last_accessed: self.last_accessed,
            inserted_at: self.inserted_at,
            seq: self.seq,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct RecencyKey {
    last_accessed: Instant,
    inserted_at: Instant,
    seq: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_entry_is_unaccessed() {
        let now = Instant::now();
        let entry = CacheEntry::new("k".to_string(), 1u32, 4, now, 0);
        assert_eq!(entry.access_count, 0);
        assert_eq!(entry.inserted_at, entry.last_accessed);
    }

    #[test]
    fn test_expiry_is_strict() {
        let now = Instant::now();
        let entry = CacheEntry::new("k".to_string(), (), 0, now, 0);
        let ttl = Duration::from_secs(10);
        assert!(!entry.is_expired(now + ttl, ttl));
        assert!(entry.is_expired(now + ttl + Duration::from_millis(1), ttl));
    }

    #[test]
    fn test_recency_orders_by_access_then_insertion() {
        let t0 = Instant::now();
        let t1 = t0 + Duration::from_secs(1);
        let mut a = CacheEntry::new("a".to_string(), (), 0, t0, 0);
        let b = CacheEntry::new("b".to_string(), (), 0, t0, 1);
        assert!(a.recency_key() < b.recency_key());

        a.touch(t1);
        assert!(b.recency_key() < a.recency_key());
        assert_eq!(a.access_count, 1);
    }
}
