//! Cache Module
//!
//! Named, byte-bounded caches with TTL expiry and least-recently-used
//! eviction, plus memoized call sites built on top of them.

mod config;
mod entry;
mod manager;
mod memoize;

pub use config::{CacheConfig, OversizePolicy};
pub use entry::CacheEntry;
pub use manager::{CacheManager, CacheStats};
pub use memoize::CachedFn;
