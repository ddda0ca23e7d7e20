//! Memory Module
//!
//! Process memory probes and threshold monitoring.

pub mod monitor;

pub use monitor::{MemoryMonitor, MemoryProbe, MemoryUsage, SysinfoProbe, UnavailableProbe};
