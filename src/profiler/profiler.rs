//! Performance Profiler
//!
//! Wraps a unit of work, timing it on a monotonic clock and sampling
//! process memory before and after. Results are appended in call order
//! and can be queried for the slowest or most memory-hungry calls.
//!
//! The result list is locked only to append or read, never while the
//! profiled work runs, so one profiler can be shared and nested calls
//! are fine.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use super::result::{ProfileResult, ProfileSummary};
use crate::error::{PerfError, Result};
use crate::memory::{MemoryProbe, SysinfoProbe};
use crate::utils::{Clock, SystemClock};

const REPORT_WIDTH: usize = 70;
const REPORT_TOP_N: usize = 5;

/// Configuration for the profiler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfilerConfig {
    /// Calls slower than this are logged at warn level
    pub slow_threshold_ms: f64,
    /// Retain at most this many results, dropping the oldest
    pub max_results: Option<usize>,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            slow_threshold_ms: 100.0,
            max_results: None,
        }
    }
}

impl ProfilerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.slow_threshold_ms.is_nan() || self.slow_threshold_ms < 0.0 {
            return Err(PerfError::Config(format!(
                "slow_threshold_ms must be a non-negative number, got {}",
                self.slow_threshold_ms
            )));
        }
        Ok(())
    }
}

/// Records timing and memory for profiled calls
pub struct PerformanceProfiler {
    config: ProfilerConfig,
    probe: Arc<dyn MemoryProbe>,
    clock: Arc<dyn Clock>,
    results: Mutex<VecDeque<ProfileResult>>,
}

/// Takes the closing measurement when dropped, so a call that unwinds
/// is still recorded.
struct Measurement<'p> {
    profiler: &'p PerformanceProfiler,
    name: &'p str,
    memory_before_mb: Option<f64>,
    started: Instant,
}

impl Drop for Measurement<'_> {
    fn drop(&mut self) {
        let finished = self.profiler.clock.now();
        let memory_after_mb = self.profiler.probe.process_memory_mb();
        let duration_ms = finished.saturating_duration_since(self.started).as_secs_f64() * 1000.0;
        // A delta is only meaningful when both readings exist
        let (before, after) = match (self.memory_before_mb, memory_after_mb) {
            (Some(before), Some(after)) => (before, after),
            _ => (0.0, 0.0),
        };
        self.profiler.record(ProfileResult::new(self.name, duration_ms, before, after));
    }
}

impl PerformanceProfiler {
    /// Profiler on the system clock and the `sysinfo` memory probe
    pub fn new(config: ProfilerConfig) -> Self {
        Self::with_sources(config, Arc::new(SysinfoProbe::new()), Arc::new(SystemClock))
    }

    /// Profiler reading memory and time from the given sources
    pub fn with_sources(config: ProfilerConfig, probe: Arc<dyn MemoryProbe>, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            probe,
            clock,
            results: Mutex::new(VecDeque::new()),
        }
    }

    pub fn config(&self) -> &ProfilerConfig {
        &self.config
    }

    fn record(&self, result: ProfileResult) {
        if result.duration_ms > self.config.slow_threshold_ms {
            warn!(
                name = %result.name,
                duration_ms = result.duration_ms,
                threshold_ms = self.config.slow_threshold_ms,
                "Slow operation"
            );
        } else {
            debug!(
                name = %result.name,
                duration_ms = result.duration_ms,
                memory_delta_mb = result.memory_delta_mb,
                "Profiled operation"
            );
        }

        let mut results = self.results.lock();
        results.push_back(result);
        if let Some(max) = self.config.max_results {
            while results.len() > max {
                results.pop_front();
            }
        }
    }

    /// Run `work`, record one [`ProfileResult`] under `name`, and return
    /// whatever `work` returned.
    ///
    /// The result is recorded even when `work` panics; the panic then
    /// continues to unwind.
    pub fn profile<R, F>(&self, name: &str, work: F) -> R
    where
        F: FnOnce() -> R,
    {
        let memory_before_mb = self.probe.process_memory_mb();
        let _measurement = Measurement {
            profiler: self,
            name,
            memory_before_mb,
            started: self.clock.now(),
        };
        work()
    }

    /// Wrap `func` so every call through the returned handle is profiled under `name`
    pub fn instrument<F>(self: &Arc<Self>, name: impl Into<String>, func: F) -> ProfiledFn<F> {
        ProfiledFn {
            profiler: Arc::clone(self),
            name: name.into(),
            func,
        }
    }

    /// Up to `n` results, longest duration first; ties keep call order
    pub fn slowest(&self, n: usize) -> Vec<ProfileResult> {
        self.top_by(n, |r| r.duration_ms)
    }

    /// Up to `n` results, largest memory growth first; ties keep call order
    pub fn heaviest_memory(&self, n: usize) -> Vec<ProfileResult> {
        self.top_by(n, |r| r.memory_delta_mb)
    }

    fn top_by(&self, n: usize, metric: impl Fn(&ProfileResult) -> f64) -> Vec<ProfileResult> {
        let mut sorted: Vec<ProfileResult> = self.results.lock().iter().cloned().collect();
        // Stable sort keeps earlier results first among equals
        sorted.sort_by(|a, b| metric(b).total_cmp(&metric(a)));
        sorted.truncate(n);
        sorted
    }

    /// Snapshot of all retained results in call order
    pub fn results(&self) -> Vec<ProfileResult> {
        self.results.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.results.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all retained results
    pub fn clear(&self) {
        self.results.lock().clear();
    }

    pub fn summary(&self) -> ProfileSummary {
        let results = self.results.lock();
        ProfileSummary {
            count: results.len(),
            total_duration_ms: results.iter().map(|r| r.duration_ms).sum(),
            total_memory_delta_mb: results.iter().map(|r| r.memory_delta_mb).sum(),
        }
    }

    /// Text report: totals, then the slowest and the heaviest calls
    pub fn report(&self) -> String {
        let summary = self.summary();
        if summary.count == 0 {
            return "No profile results".to_string();
        }

        let rule = "=".repeat(REPORT_WIDTH);
        let thin = "-".repeat(REPORT_WIDTH);
        let mut lines = vec![
            rule.clone(),
            "Performance Profile Results".to_string(),
            rule.clone(),
            String::new(),
            format!("Total measurements: {}", summary.count),
            format!("Total time: {:.1}ms", summary.total_duration_ms),
            format!("Total memory delta: {:.2}MB", summary.total_memory_delta_mb),
            String::new(),
            "Slowest operations:".to_string(),
            thin.clone(),
        ];

        for result in self.slowest(REPORT_TOP_N) {
            lines.push(format!(
                "  {:40} {:8.2}ms Mem: {:+6.2}MB",
                result.name, result.duration_ms, result.memory_delta_mb
            ));
        }

        lines.push(String::new());
        lines.push("Most memory usage:".to_string());
        lines.push(thin);
        for result in self.heaviest_memory(REPORT_TOP_N) {
            lines.push(format!(
                "  {:40} {:+8.2}MB Time: {:7.2}ms",
                result.name, result.memory_delta_mb, result.duration_ms
            ));
        }

        lines.push(String::new());
        lines.push(rule);
        lines.join("\n")
    }
}

impl Default for PerformanceProfiler {
    fn default() -> Self {
        Self::new(ProfilerConfig::default())
    }
}

/// A function bound to a profiler and a label
pub struct ProfiledFn<F> {
    profiler: Arc<PerformanceProfiler>,
    name: String,
    func: F,
}

impl<F> ProfiledFn<F> {
    /// Call the wrapped function under the profiler
    pub fn call<A, R>(&self, args: A) -> R
    where
        F: Fn(A) -> R,
    {
        self.profiler.profile(&self.name, || (self.func)(args))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn profiler(&self) -> &Arc<PerformanceProfiler> {
        &self.profiler
    }
}
