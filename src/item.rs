//! Cache Item Module
//!
//! Defines the item object handled by the pool facade, carrying a value
//! together with its hit flag and expiry metadata.

use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use serde_json::Value;

// == Cache Item ==
/// A single cache entry as seen by the pool facade.
///
/// Items are produced by [`CachePool::get_item`](crate::pool::CachePool::get_item)
/// and mutated through [`set`](CacheItem::set),
/// [`expires_at`](CacheItem::expires_at) and
/// [`expires_after`](CacheItem::expires_after) before being saved back.
/// Construction of hit/miss items is internal to the crate; callers can
/// never forge the hit flag or expiry directly.
#[derive(Debug, Clone)]
pub struct CacheItem {
    key: String,
    value: Value,
    is_hit: bool,
    /// Absolute expiry as seconds since the Unix epoch, None = no expiration
    expiry: Option<f64>,
    /// Fallback lifetime in seconds applied when no expiry is set, 0 = store forever
    default_lifetime: u64,
}

impl CacheItem {
    // == Internal Constructors ==
    /// Creates an item representing a cache hit.
    pub(crate) fn hit(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
            is_hit: true,
            expiry: None,
            default_lifetime: 0,
        }
    }

    /// Creates an item representing a cache miss.
    pub(crate) fn miss(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Value::Null,
            is_hit: false,
            expiry: None,
            default_lifetime: 0,
        }
    }

    /// Sets the fallback lifetime used when no explicit expiry is given.
    pub(crate) fn with_default_lifetime(mut self, seconds: u64) -> Self {
        self.default_lifetime = seconds;
        self
    }

    /// Absolute expiry timestamp, if one was set.
    pub(crate) fn expiry(&self) -> Option<f64> {
        self.expiry
    }

    /// Fallback lifetime in seconds (0 = store forever).
    pub(crate) fn default_lifetime(&self) -> u64 {
        self.default_lifetime
    }

    /// Consumes the item and returns its value.
    pub(crate) fn into_value(self) -> Value {
        self.value
    }

    // == Accessors ==
    /// Returns the key this item was requested under.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the stored value (`Value::Null` for a miss).
    pub fn get(&self) -> &Value {
        &self.value
    }

    /// Returns true if the item was found in the cache.
    pub fn is_hit(&self) -> bool {
        self.is_hit
    }

    // == Mutators ==
    /// Replaces the value carried by this item.
    pub fn set(&mut self, value: Value) -> &mut Self {
        self.value = value;
        self
    }

    /// Sets an absolute expiration time.
    ///
    /// Passing `None` resets the expiry to the default lifetime
    /// (or to "no expiration" when the default lifetime is 0).
    pub fn expires_at(&mut self, expiration: Option<DateTime<Utc>>) -> &mut Self {
        self.expiry = match expiration {
            Some(at) => Some(at.timestamp_micros() as f64 / 1_000_000.0),
            None => self.default_expiry(),
        };
        self
    }

    /// Sets the expiration as a relative number of seconds from now.
    ///
    /// Passing `None` resets the expiry to the default lifetime
    /// (or to "no expiration" when the default lifetime is 0).
    pub fn expires_after(&mut self, seconds: Option<u64>) -> &mut Self {
        self.expiry = match seconds {
            Some(ttl) => Some(now() + ttl as f64),
            None => self.default_expiry(),
        };
        self
    }

    fn default_expiry(&self) -> Option<f64> {
        if self.default_lifetime > 0 {
            Some(now() + self.default_lifetime as f64)
        } else {
            None
        }
    }
}

// == Utility Functions ==
/// Returns the current time as fractional seconds since the Unix epoch.
pub(crate) fn now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_secs_f64()
}
