//! Error types for cache operations.

use std::fmt;

/// Result type for all cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the cache.
///
/// Only external-tier failures and configuration problems are errors.
/// Records that cannot be placed (no id, no resolvable guild) are reported
/// through [`SetOutcome`](crate::store::SetOutcome) instead, so ingestion
/// keeps flowing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// An external-tier delegate (`get_item`, `set_item`, `remove_item`)
    /// or a bulk remover hook failed.
    StorageError(String),

    /// A byte backend (in-memory, Redis, Memcached) failed.
    BackendError(String),

    /// Encoding a record for a byte backend failed.
    SerializationError(String),

    /// Decoding a record read from a byte backend failed.
    DeserializationError(String),

    /// The stored bytes are not a cache envelope (bad magic or truncated).
    InvalidCacheEntry(String),

    /// The stored envelope was written with a different schema version.
    VersionMismatch { expected: u32, found: u32 },

    /// Invalid cache configuration.
    ConfigError(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::StorageError(msg) => write!(f, "external storage error: {}", msg),
            Error::BackendError(msg) => write!(f, "cache backend error: {}", msg),
            Error::SerializationError(msg) => write!(f, "serialization error: {}", msg),
            Error::DeserializationError(msg) => write!(f, "deserialization error: {}", msg),
            Error::InvalidCacheEntry(msg) => write!(f, "invalid cache entry: {}", msg),
            Error::VersionMismatch { expected, found } => write!(
                f,
                "cache schema version mismatch: expected {}, found {}",
                expected, found
            ),
            Error::ConfigError(msg) => write!(f, "configuration error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<postcard::Error> for Error {
    fn from(e: postcard::Error) -> Self {
        Error::DeserializationError(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::SerializationError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::StorageError("connection reset".to_string());
        assert_eq!(err.to_string(), "external storage error: connection reset");

        let err = Error::VersionMismatch {
            expected: 1,
            found: 2,
        };
        assert_eq!(
            err.to_string(),
            "cache schema version mismatch: expected 1, found 2"
        );
    }

    #[test]
    fn test_json_error_converts() {
        let parsed: std::result::Result<crate::model::User, _> = serde_json::from_str("{\"id\":");
        let err: Error = parsed.expect_err("truncated json parsed").into();
        assert!(matches!(err, Error::SerializationError(_)));
    }

    #[test]
    fn test_error_is_std_error() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&Error::ConfigError("bad".to_string()));
    }
}
