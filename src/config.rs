//! Configuration Module
//!
//! Handles loading and managing cache configuration from environment variables.

use std::env;

// == Decode Error Mode ==
/// Controls what happens when a stored value cannot be decoded.
///
/// Historical cache implementations disagree here: some raise, some
/// swallow the failure and report a miss. The choice is explicit
/// configuration rather than a guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodeErrorMode {
    /// Treat an undecodable value as a cache miss (default)
    #[default]
    Miss,
    /// Surface the decode failure as an error
    Error,
}

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Default TTL in seconds applied to entries without an explicit TTL (0 = store forever)
    pub default_ttl: u64,
    /// Maximum number of entries the in-memory store can hold
    pub max_entries: usize,
    /// Behavior when a stored value cannot be decoded
    pub decode_errors: DecodeErrorMode,
}

impl CacheConfig {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_DEFAULT_TTL` - Default TTL in seconds, 0 = store forever (default: 0)
    /// - `CACHE_MAX_ENTRIES` - Maximum in-memory entries (default: 1000)
    /// - `CACHE_DECODE_ERRORS` - `miss` or `error` (default: miss)
    pub fn from_env() -> Self {
        Self {
            default_ttl: env::var("CACHE_DEFAULT_TTL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            max_entries: env::var("CACHE_MAX_ENTRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1000),
            decode_errors: match env::var("CACHE_DECODE_ERRORS").ok().as_deref() {
                Some("error") => DecodeErrorMode::Error,
                _ => DecodeErrorMode::Miss,
            },
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: 0,
            max_entries: 1000,
            decode_errors: DecodeErrorMode::Miss,
        }
    }
}
