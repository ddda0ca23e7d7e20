//! Optimization context
//!
//! Owns the settings, a registry of named caches, one shared profiler and
//! a memory monitor. Code that needs a cache or the profiler is handed a
//! context (or an `Arc` taken from it) rather than reaching for globals,
//! and each test can build its own.

use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::batch::{BatchOperation, BatchProcessor};
use crate::cache::{CacheManager, CacheStats};
use crate::config::OptimizationSettings;
use crate::error::{PerfError, Result};
use crate::memory::{MemoryMonitor, MemoryProbe, SysinfoProbe};
use crate::profiler::PerformanceProfiler;
use crate::utils::{Clock, SystemClock};

/// Type-erased view of a registered cache
trait RegisteredCache: Send + Sync {
    fn stats(&self) -> CacheStats;
    fn report(&self) -> String;
    fn clear(&self);
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<V: Send + Sync + 'static> RegisteredCache for CacheManager<V> {
    fn stats(&self) -> CacheStats {
        CacheManager::stats(self)
    }

    fn report(&self) -> String {
        CacheManager::report(self)
    }

    fn clear(&self) {
        CacheManager::clear(self)
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Explicit home for the shared optimization state
pub struct OptimizationContext {
    settings: OptimizationSettings,
    clock: Arc<dyn Clock>,
    caches: RwLock<HashMap<String, Arc<dyn RegisteredCache>>>,
    profiler: Arc<PerformanceProfiler>,
    memory: MemoryMonitor,
}

impl OptimizationContext {
    /// Validate `settings` and build a context on the system clock and
    /// the `sysinfo` memory probe
    pub fn new(settings: OptimizationSettings) -> Result<Self> {
        Self::with_sources(settings, Arc::new(SystemClock), Arc::new(SysinfoProbe::new()))
    }

    /// Context reading time and memory from the given sources
    pub fn with_sources(
        settings: OptimizationSettings,
        clock: Arc<dyn Clock>,
        probe: Arc<dyn MemoryProbe>,
    ) -> Result<Self> {
        settings.validate()?;
        let profiler = PerformanceProfiler::with_sources(settings.profiler.clone(), Arc::clone(&probe), Arc::clone(&clock));
        let memory = MemoryMonitor::with_probe(settings.memory_warning_mb, probe);
        Ok(Self {
            settings,
            clock,
            caches: RwLock::new(HashMap::new()),
            profiler: Arc::new(profiler),
            memory,
        })
    }

    /// Context built from `PERFKIT_*` environment overrides
    pub fn from_env() -> Result<Self> {
        Self::new(OptimizationSettings::from_env())
    }

    pub fn settings(&self) -> &OptimizationSettings {
        &self.settings
    }

    /// The cache registered under `name`, created from the cache settings
    /// on first use. Asking for an existing name with a different value
    /// type is an error.
    pub fn cache<V>(&self, name: &str) -> Result<Arc<CacheManager<V>>>
    where
        V: Send + Sync + 'static,
    {
        if let Some(existing) = self.caches.read().get(name) {
            return downcast_cache(name, Arc::clone(existing));
        }

        let mut caches = self.caches.write();
        // Another thread may have registered it between the two locks
        if let Some(existing) = caches.get(name) {
            return downcast_cache(name, Arc::clone(existing));
        }

        let cache = Arc::new(CacheManager::<V>::with_clock(
            name,
            self.settings.cache.clone(),
            Arc::clone(&self.clock),
        ));
        caches.insert(name.to_string(), cache.clone() as Arc<dyn RegisteredCache>);
        info!(
            cache = %name,
            max_size_bytes = self.settings.cache.max_size_bytes,
            ttl_seconds = self.settings.cache.ttl_seconds,
            "Created cache"
        );
        Ok(cache)
    }

    /// Names of all registered caches, sorted
    pub fn cache_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.caches.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Statistics for every registered cache, sorted by name
    pub fn cache_stats(&self) -> Vec<CacheStats> {
        let mut stats: Vec<CacheStats> = self.caches.read().values().map(|c| c.stats()).collect();
        stats.sort_by(|a, b| a.name.cmp(&b.name));
        stats
    }

    /// Empty every registered cache; the caches stay registered
    pub fn clear_caches(&self) {
        for cache in self.caches.read().values() {
            cache.clear();
        }
    }

    /// Unregister a cache. Handles already given out keep working.
    pub fn remove_cache(&self, name: &str) -> bool {
        self.caches.write().remove(name).is_some()
    }

    /// The shared profiler
    pub fn profiler(&self) -> Arc<PerformanceProfiler> {
        Arc::clone(&self.profiler)
    }

    /// Profile `work` on the shared profiler
    pub fn profile<R, F>(&self, name: &str, work: F) -> R
    where
        F: FnOnce() -> R,
    {
        self.profiler.profile(name, work)
    }

    pub fn memory(&self) -> &MemoryMonitor {
        &self.memory
    }

    /// A fresh processor using the batch settings
    pub fn batch_processor<T, Op>(&self) -> BatchProcessor<T, Op>
    where
        Op: BatchOperation<T>,
    {
        BatchProcessor::new(self.settings.batch.clone())
    }

    /// Every cache report followed by the profiler report
    pub fn report(&self) -> String {
        let caches = self.caches.read();
        let mut names: Vec<&String> = caches.keys().collect();
        names.sort();

        let mut sections: Vec<String> = names.into_iter().map(|name| caches[name].report()).collect();
        sections.push(self.profiler.report());
        sections.join("\n\n")
    }
}

impl Default for OptimizationContext {
    fn default() -> Self {
        let settings = OptimizationSettings::default();
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let probe: Arc<dyn MemoryProbe> = Arc::new(SysinfoProbe::new());
        Self {
            profiler: Arc::new(PerformanceProfiler::with_sources(
                settings.profiler.clone(),
                Arc::clone(&probe),
                Arc::clone(&clock),
            )),
            memory: MemoryMonitor::with_probe(settings.memory_warning_mb, probe),
            caches: RwLock::new(HashMap::new()),
            clock,
            settings,
        }
    }
}

fn downcast_cache<V>(name: &str, cache: Arc<dyn RegisteredCache>) -> Result<Arc<CacheManager<V>>>
where
    V: Send + Sync + 'static,
{
    cache
        .into_any()
        .downcast::<CacheManager<V>>()
        .map_err(|_| PerfError::CacheTypeMismatch {
            name: name.to_string(),
        })
}
