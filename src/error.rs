//! Error types for the cache library
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for all cache operations.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key failed validation (empty, too long, or reserved characters)
    #[error("Invalid cache key {key:?}: {reason}")]
    InvalidKey {
        /// The rejected key
        key: String,
        /// Why it was rejected
        reason: String,
    },

    /// An argument other than the key was invalid (e.g. negative beta)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A value-producing callback requested its own key while computing it
    #[error("Duplicated cache key {0:?}, causing a circular reference")]
    CircularReference(String),

    /// Backend could not be constructed (unknown scheme, bad DSN)
    #[error("Cache configuration error: {0}")]
    Configuration(String),

    /// A stored value could not be decoded
    #[error("Failed to decode stored value for key {key:?}")]
    Decode {
        /// The key whose value failed to decode
        key: String,
        /// The underlying JSON error
        #[source]
        source: serde_json::Error,
    },

    /// Filesystem backend failure
    #[error("Cache I/O error")]
    Io(#[from] std::io::Error),

    /// SQLite backend failure
    #[error("Cache database error")]
    Sqlite(#[from] rusqlite::Error),

    /// A value could not be encoded for storage
    #[error("Failed to encode value for storage")]
    Encode(#[source] serde_json::Error),
}

// == Result Type Alias ==
/// Convenience Result type for the cache library.
pub type Result<T> = std::result::Result<T, CacheError>;
