//! Error types for perfkit

use thiserror::Error;

/// Result type alias for perfkit operations
pub type Result<T> = std::result::Result<T, PerfError>;

/// Main error type for perfkit
///
/// Errors raised by caller-supplied work (compute closures, batch
/// operations, profiled calls) are never folded into this type; they
/// travel back to the caller with their own type.
#[derive(Error, Debug)]
pub enum PerfError {
    #[error("Entry `{key}` needs {size_bytes} bytes but the cache budget is {max_size_bytes} bytes")]
    EntryTooLarge {
        key: String,
        size_bytes: usize,
        max_size_bytes: usize,
    },

    #[error("Cache `{name}` already exists with a different value type")]
    CacheTypeMismatch { name: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PerfError::Config("batch_size must be positive".to_string());
        assert_eq!(err.to_string(), "Configuration error: batch_size must be positive");
    }

    #[test]
    fn test_entry_too_large_display() {
        let err = PerfError::EntryTooLarge {
            key: "big".to_string(),
            size_bytes: 200,
            max_size_bytes: 100,
        };
        assert_eq!(
            err.to_string(),
            "Entry `big` needs 200 bytes but the cache budget is 100 bytes"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: PerfError = io_err.into();
        assert!(matches!(err, PerfError::Io(_)));
    }
}
