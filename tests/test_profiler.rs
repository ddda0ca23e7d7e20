//! Integration tests for the profiler: error and panic propagation,
//! ranking queries and memory degradation

use perfkit::memory::{MemoryProbe, MemoryUsage, UnavailableProbe};
use perfkit::profiler::{PerformanceProfiler, ProfilerConfig};
use perfkit::utils::ManualClock;
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

/// Memory that the test moves by hand
struct SettableProbe {
    rss_mb: Mutex<f64>,
}

impl SettableProbe {
    fn new(rss_mb: f64) -> Self {
        Self {
            rss_mb: Mutex::new(rss_mb),
        }
    }

    fn grow(&self, mb: f64) {
        *self.rss_mb.lock() += mb;
    }
}

impl MemoryProbe for SettableProbe {
    fn usage(&self) -> Option<MemoryUsage> {
        Some(MemoryUsage {
            rss_mb: *self.rss_mb.lock(),
            vms_mb: 0.0,
            percent: 0.0,
        })
    }
}

fn profiler_with(probe: Arc<dyn MemoryProbe>) -> (PerformanceProfiler, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let profiler = PerformanceProfiler::with_sources(ProfilerConfig::default(), probe, clock.clone());
    (profiler, clock)
}

// ============================================================================
// Propagation
// ============================================================================

#[test]
fn test_error_is_returned_and_recorded_once() {
    let (profiler, _) = profiler_with(Arc::new(UnavailableProbe));

    let result: Result<u32, std::io::Error> = profiler.profile("x", || {
        Err(std::io::Error::new(std::io::ErrorKind::NotFound, "missing asset"))
    });

    let err = result.unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    let results = profiler.results();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].name, "x");
}

#[test]
fn test_panic_resumes_and_is_recorded_once() {
    let (profiler, clock) = profiler_with(Arc::new(UnavailableProbe));

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        profiler.profile("x", || -> u32 {
            clock.advance(Duration::from_millis(7));
            panic!("bake failed")
        })
    }));

    let payload = outcome.unwrap_err();
    assert_eq!(payload.downcast_ref::<&str>(), Some(&"bake failed"));
    let results = profiler.results();
    assert_eq!(results.len(), 1);
    assert!((results[0].duration_ms - 7.0).abs() < 1e-9);
}

// ============================================================================
// Ranking
// ============================================================================

#[test]
fn test_slowest_and_heaviest() {
    let probe = Arc::new(SettableProbe::new(100.0));
    let (profiler, clock) = profiler_with(probe.clone());

    let workload = [("parse", 30, 1.0), ("render", 80, 12.0), ("upload", 30, 40.0), ("idle", 1, 0.0)];
    for (name, ms, mb) in workload {
        profiler.profile(name, || {
            clock.advance(Duration::from_millis(ms));
            probe.grow(mb);
        });
    }

    let slowest: Vec<String> = profiler.slowest(3).into_iter().map(|r| r.name).collect();
    assert_eq!(slowest, vec!["render", "parse", "upload"]);

    let heaviest = profiler.heaviest_memory(2);
    assert_eq!(heaviest[0].name, "upload");
    assert!((heaviest[0].memory_delta_mb - 40.0).abs() < 1e-9);
    assert_eq!(heaviest[1].name, "render");

    let summary = profiler.summary();
    assert_eq!(summary.count, 4);
    assert!((summary.total_duration_ms - 141.0).abs() < 1e-9);
    assert!((summary.total_memory_delta_mb - 53.0).abs() < 1e-9);
}

#[test]
fn test_report_lists_top_operations() {
    let probe = Arc::new(SettableProbe::new(10.0));
    let (profiler, clock) = profiler_with(probe.clone());
    for i in 0..7u64 {
        profiler.profile(&format!("step_{i}"), || clock.advance(Duration::from_millis(i + 1)));
    }

    let report = profiler.report();
    assert!(report.contains("Performance Profile Results"));
    assert!(report.contains("Slowest operations:"));
    assert!(report.contains("Most memory usage:"));
    assert!(report.contains("step_6"));
    assert!(report.contains("Total measurements: 7"));
}

// ============================================================================
// Memory degradation
// ============================================================================

#[test]
fn test_unavailable_memory_reports_zero() {
    let (profiler, _) = profiler_with(Arc::new(UnavailableProbe));
    profiler.profile("x", || vec![0u8; 1 << 20].len());

    let result = &profiler.results()[0];
    assert_eq!(result.memory_before_mb, 0.0);
    assert_eq!(result.memory_after_mb, 0.0);
    assert_eq!(result.memory_delta_mb, 0.0);
}

#[test]
fn test_instrumented_fn_shares_profiler_across_threads() {
    let (profiler, _) = profiler_with(Arc::new(UnavailableProbe));
    let profiler = Arc::new(profiler);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let profiler = Arc::clone(&profiler);
            std::thread::spawn(move || {
                let checksum = profiler.instrument("checksum", |data: &[u8]| {
                    data.iter().map(|b| *b as u64).sum::<u64>()
                });
                for _ in 0..10 {
                    assert_eq!(checksum.call(&[1u8, 2, 3][..]), 6);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(profiler.len(), 40);
}
