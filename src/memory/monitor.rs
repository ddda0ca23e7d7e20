//! Memory Monitoring Module
//!
//! Best-effort process memory readings. Platforms that cannot report
//! process memory yield `None` from a probe and zeros from the monitor,
//! never an error.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use sysinfo::{Pid, System};
use tracing::warn;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Process memory snapshot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemoryUsage {
    /// Resident set size in MB
    pub rss_mb: f64,
    /// Virtual memory size in MB
    pub vms_mb: f64,
    /// Resident size as a percentage of total system memory
    pub percent: f64,
}

/// Source of process memory readings
pub trait MemoryProbe: Send + Sync {
    /// Current usage, or `None` when the platform cannot report it
    fn usage(&self) -> Option<MemoryUsage>;

    /// Resident memory in MB
    fn process_memory_mb(&self) -> Option<f64> {
        self.usage().map(|usage| usage.rss_mb)
    }
}

/// Reads the current process through `sysinfo`
pub struct SysinfoProbe {
    pid: Pid,
    system: Mutex<System>,
}

impl SysinfoProbe {
    pub fn new() -> Self {
        Self {
            pid: Pid::from_u32(std::process::id()),
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for SysinfoProbe {
    fn usage(&self) -> Option<MemoryUsage> {
        let mut system = self.system.lock();
        if !system.refresh_process(self.pid) {
            return None;
        }
        system.refresh_memory();

        let process = system.process(self.pid)?;
        let rss = process.memory() as f64;
        let total = system.total_memory() as f64;
        Some(MemoryUsage {
            rss_mb: rss / BYTES_PER_MB,
            vms_mb: process.virtual_memory() as f64 / BYTES_PER_MB,
            percent: if total > 0.0 { rss / total * 100.0 } else { 0.0 },
        })
    }
}

/// A probe for hosts without memory introspection
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableProbe;

impl MemoryProbe for UnavailableProbe {
    fn usage(&self) -> Option<MemoryUsage> {
        None
    }
}

/// Tracks process memory against a warning threshold
pub struct MemoryMonitor {
    probe: Arc<dyn MemoryProbe>,
    warning_mb: f64,
    initial_memory_mb: f64,
}

impl MemoryMonitor {
    /// Create a monitor on the `sysinfo` probe.
    ///
    /// * `warning_mb` – resident size above which [`exceeds_warning`](Self::exceeds_warning) fires.
    pub fn new(warning_mb: f64) -> Self {
        Self::with_probe(warning_mb, Arc::new(SysinfoProbe::new()))
    }

    pub fn with_probe(warning_mb: f64, probe: Arc<dyn MemoryProbe>) -> Self {
        let initial_memory_mb = probe.process_memory_mb().unwrap_or(0.0);
        Self {
            probe,
            warning_mb,
            initial_memory_mb,
        }
    }

    pub fn probe(&self) -> &Arc<dyn MemoryProbe> {
        &self.probe
    }

    pub fn warning_mb(&self) -> f64 {
        self.warning_mb
    }

    /// Detailed usage, if available
    pub fn usage(&self) -> Option<MemoryUsage> {
        self.probe.usage()
    }

    /// Current resident memory in MB, 0 when unavailable
    pub fn memory_mb(&self) -> f64 {
        self.probe.process_memory_mb().unwrap_or(0.0)
    }

    /// Change in resident memory since the monitor was created (MB)
    pub fn delta_mb(&self) -> f64 {
        self.memory_mb() - self.initial_memory_mb
    }

    /// Whether resident memory is above the warning threshold.
    /// Logs a warning when it is.
    pub fn exceeds_warning(&self) -> bool {
        match self.probe.process_memory_mb() {
            Some(rss_mb) if rss_mb > self.warning_mb => {
                warn!(rss_mb, warning_mb = self.warning_mb, "Process memory above warning threshold");
                true
            }
            _ => false,
        }
    }
}

impl Default for MemoryMonitor {
    fn default() -> Self {
        Self::new(2048.0)
    }
}
