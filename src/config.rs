//! Optimization settings
//!
//! One struct bundling the cache, batch and profiler configuration, read
//! once from defaults, the environment, or a JSON file.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::batch::BatchConfig;
use crate::cache::CacheConfig;
use crate::error::{PerfError, Result};
use crate::profiler::ProfilerConfig;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Top-level settings for an [`OptimizationContext`](crate::context::OptimizationContext)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizationSettings {
    /// Settings for every cache created through the context
    pub cache: CacheConfig,
    pub batch: BatchConfig,
    pub profiler: ProfilerConfig,
    /// Resident memory above which the monitor warns
    pub memory_warning_mb: f64,
}

impl Default for OptimizationSettings {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            batch: BatchConfig::default(),
            profiler: ProfilerConfig::default(),
            memory_warning_mb: 2048.0,
        }
    }
}

impl OptimizationSettings {
    /// Defaults overridden by `PERFKIT_*` environment variables.
    /// Unparsable values are ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each `PERFKIT_*` key
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();

        if let Some(enabled) = lookup("PERFKIT_CACHE_ENABLED").and_then(|v| parse_bool(&v)) {
            settings.cache.enabled = enabled;
        }
        if let Some(mb) = lookup("PERFKIT_CACHE_MAX_SIZE_MB").and_then(|v| v.trim().parse::<u64>().ok()) {
            settings.cache.max_size_bytes = mb.saturating_mul(BYTES_PER_MB);
        }
        if let Some(ttl) = lookup("PERFKIT_CACHE_TTL_SECONDS").and_then(|v| v.trim().parse().ok()) {
            settings.cache.ttl_seconds = ttl;
        }
        if let Some(size) = lookup("PERFKIT_BATCH_SIZE").and_then(|v| v.trim().parse().ok()) {
            settings.batch.batch_size = size;
        }
        if let Some(defer) = lookup("PERFKIT_DEFER_BATCH_EXECUTION").and_then(|v| parse_bool(&v)) {
            settings.batch.defer_execution = defer;
        }
        if let Some(ms) = lookup("PERFKIT_PROFILE_SLOW_THRESHOLD_MS").and_then(|v| v.trim().parse().ok()) {
            settings.profiler.slow_threshold_ms = ms;
        }
        if let Some(mb) = lookup("PERFKIT_MEMORY_WARNING_MB").and_then(|v| v.trim().parse().ok()) {
            settings.memory_warning_mb = mb;
        }

        settings
    }

    /// Load from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: Self = serde_json::from_str(&content)?;
        Ok(settings)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.cache.validate()?;
        self.batch.validate()?;
        self.profiler.validate()?;
        if self.memory_warning_mb.is_nan() || self.memory_warning_mb <= 0.0 {
            return Err(PerfError::Config(format!(
                "memory_warning_mb must be positive, got {}",
                self.memory_warning_mb
            )));
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = OptimizationSettings::default();
        assert_eq!(settings.batch.batch_size, 100);
        assert!(!settings.batch.defer_execution);
        assert_eq!(settings.profiler.slow_threshold_ms, 100.0);
        assert_eq!(settings.memory_warning_mb, 2048.0);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_lookup_overrides() {
        let settings = OptimizationSettings::from_lookup(lookup_from(&[
            ("PERFKIT_CACHE_ENABLED", "false"),
            ("PERFKIT_CACHE_MAX_SIZE_MB", "200"),
            ("PERFKIT_CACHE_TTL_SECONDS", "60"),
            ("PERFKIT_BATCH_SIZE", "16"),
            ("PERFKIT_DEFER_BATCH_EXECUTION", "1"),
            ("PERFKIT_PROFILE_SLOW_THRESHOLD_MS", "2.5"),
            ("PERFKIT_MEMORY_WARNING_MB", "512"),
        ]));

        assert!(!settings.cache.enabled);
        assert_eq!(settings.cache.max_size_bytes, 200 * 1024 * 1024);
        assert_eq!(settings.cache.ttl_seconds, 60);
        assert_eq!(settings.batch.batch_size, 16);
        assert!(settings.batch.defer_execution);
        assert_eq!(settings.profiler.slow_threshold_ms, 2.5);
        assert_eq!(settings.memory_warning_mb, 512.0);
    }

    #[test]
    fn test_unparsable_values_ignored() {
        let settings = OptimizationSettings::from_lookup(lookup_from(&[
            ("PERFKIT_BATCH_SIZE", "lots"),
            ("PERFKIT_CACHE_ENABLED", "maybe"),
        ]));
        assert_eq!(settings, OptimizationSettings::default());
    }

    #[test]
    fn test_from_json_file_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"batch": {{"batch_size": 8}}, "memory_warning_mb": 64.0}}"#).unwrap();

        let settings = OptimizationSettings::from_json_file(file.path()).unwrap();
        assert_eq!(settings.batch.batch_size, 8);
        assert_eq!(settings.memory_warning_mb, 64.0);
        assert_eq!(settings.cache, CacheConfig::default());
    }

    #[test]
    fn test_from_json_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(matches!(
            OptimizationSettings::from_json_file(&missing),
            Err(PerfError::Io(_))
        ));

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{ not json").unwrap();
        assert!(matches!(
            OptimizationSettings::from_json_file(&bad),
            Err(PerfError::Serialization(_))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_batch() {
        let mut settings = OptimizationSettings::default();
        settings.batch.batch_size = 0;
        assert!(matches!(settings.validate(), Err(PerfError::Config(_))));
    }
}
