//! Profiling Module
//!
//! Timing and memory measurement around arbitrary calls.

#[allow(clippy::module_inception)]
mod profiler;
mod result;

pub use profiler::{PerformanceProfiler, ProfiledFn, ProfilerConfig};
pub use result::{ProfileResult, ProfileSummary};
