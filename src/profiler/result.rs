//! Profile measurements

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One profiled call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileResult {
    /// Label given to the call
    pub name: String,
    /// Wall-clock duration of the call, monotonic
    pub duration_ms: f64,
    /// Resident memory just before the call (0 when unavailable)
    pub memory_before_mb: f64,
    /// Resident memory just after the call (0 when unavailable)
    pub memory_after_mb: f64,
    /// `memory_after_mb - memory_before_mb`
    pub memory_delta_mb: f64,
    /// When the measurement was recorded, for display only
    pub recorded_at: DateTime<Utc>,
}

impl ProfileResult {
    pub fn new(name: impl Into<String>, duration_ms: f64, memory_before_mb: f64, memory_after_mb: f64) -> Self {
        Self {
            name: name.into(),
            duration_ms,
            memory_before_mb,
            memory_after_mb,
            memory_delta_mb: memory_after_mb - memory_before_mb,
            recorded_at: Utc::now(),
        }
    }
}

/// Totals over all retained results
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub count: usize,
    pub total_duration_ms: f64,
    pub total_memory_delta_mb: f64,
}
