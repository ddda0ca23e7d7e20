//! perfkit - caching, batching and profiling primitives
//!
//! This crate provides three independent building blocks for keeping hot
//! paths fast:
//! - A bounded in-memory cache with TTL expiry and LRU eviction
//! - A batch processor that groups deferred operations by target
//! - A profiler that records duration and memory change per call
//!
//! # Modules
//!
//! ## Core
//! - [`cache`] - Byte-budgeted LRU/TTL cache and memoized call sites
//! - [`batch`] - Target-grouped deferred operations
//! - [`profiler`] - Timing and memory measurement
//!
//! ## Support
//! - [`memory`] - Process memory probes and a warning-threshold monitor
//! - [`config`] - Settings from defaults, environment or JSON
//! - [`context`] - Explicit registry of named caches and the shared profiler
//! - [`utils`] - Clocks and size estimation
//! - [`cli`] - Command-line interface for the `perfkit` binary

// Core error handling
pub mod error;

// Core
pub mod batch;
pub mod cache;
pub mod profiler;

// Support
pub mod config;
pub mod context;
pub mod memory;
pub mod utils;

// Services
pub mod cli;

pub use error::{PerfError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{PerfError, Result};

    // Caching
    pub use crate::cache::{CacheConfig, CacheManager, CacheStats, CachedFn, OversizePolicy};

    // Batch processing
    pub use crate::batch::{
        run_batch, shared, BatchConfig, BatchFailure, BatchOperation, BatchProcessor, FnOperation,
        SharedTarget,
    };

    // Profiling
    pub use crate::profiler::{PerformanceProfiler, ProfileResult, ProfilerConfig};

    // Memory
    pub use crate::memory::{MemoryMonitor, MemoryProbe, MemoryUsage};

    // Settings and context
    pub use crate::config::OptimizationSettings;
    pub use crate::context::OptimizationContext;

    // Utilities
    pub use crate::utils::{Clock, ManualClock, SizeEstimate, SystemClock};
}
