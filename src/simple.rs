//! Simple Cache Module
//!
//! Key-value cache facade operating directly on values, without item
//! objects. Every key is validated before the backend is touched.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::Result;
use crate::key::validate_key;
use crate::store::Store;

// == Simple Cache ==
/// Simple key-value facade over any [`Store`].
///
/// Multi-key operations call the store's bulk methods, so backends with
/// native multi-key support serve them in one round-trip while the rest
/// fall back to per-key loops.
#[derive(Debug)]
pub struct SimpleCache<S> {
    store: S,
}

impl<S: Store> SimpleCache<S> {
    /// Wraps a backend in the simple-cache facade.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a mutable reference to the underlying backend.
    pub fn store(&mut self) -> &mut S {
        &mut self.store
    }

    /// Consumes the facade and returns the backend.
    pub fn into_inner(self) -> S {
        self.store
    }

    // == Has ==
    /// Returns true if an unexpired value exists for `key`.
    pub fn has(&mut self, key: &str) -> Result<bool> {
        validate_key(key)?;
        self.store.contains(key)
    }

    // == Get ==
    /// Retrieves the value for `key`, or `None` on a miss.
    pub fn get(&mut self, key: &str) -> Result<Option<Value>> {
        validate_key(key)?;
        self.store.fetch(key)
    }

    /// Retrieves the value for `key`, falling back to `default` on a miss.
    pub fn get_or(&mut self, key: &str, default: Value) -> Result<Value> {
        Ok(self.get(key)?.unwrap_or(default))
    }

    // == Set ==
    /// Stores `value` under `key` with an optional TTL in seconds.
    ///
    /// `None` and `Some(0)` both mean the value never expires.
    pub fn set(&mut self, key: &str, value: Value, ttl: Option<u64>) -> Result<bool> {
        validate_key(key)?;
        self.store.save(key, &value, ttl.filter(|t| *t > 0))
    }

    // == Delete ==
    /// Removes the value for `key`. Returns true if a value was removed.
    pub fn delete(&mut self, key: &str) -> Result<bool> {
        validate_key(key)?;
        self.store.delete(key)
    }

    // == Clear ==
    /// Removes every value from the backend.
    pub fn clear(&mut self) -> Result<bool> {
        self.store.flush_all()
    }

    // == Multi-Key Operations ==
    /// Retrieves several keys at once; misses map to `Value::Null`.
    pub fn get_multiple(&mut self, keys: &[&str]) -> Result<HashMap<String, Value>> {
        for key in keys {
            validate_key(key)?;
        }

        let ids: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        let mut found = self.store.fetch_multiple(&ids)?;

        Ok(ids
            .into_iter()
            .map(|id| {
                let value = found.remove(&id).unwrap_or(Value::Null);
                (id, value)
            })
            .collect())
    }

    /// Stores several key-value pairs with a shared optional TTL.
    /// Returns true only if every write succeeded.
    pub fn set_multiple(&mut self, values: &[(String, Value)], ttl: Option<u64>) -> Result<bool> {
        for (key, _) in values {
            validate_key(key)?;
        }

        self.store.save_multiple(values, ttl.filter(|t| *t > 0))
    }

    /// Removes several keys. Every key is processed; returns true only if
    /// every key named an existing value.
    pub fn delete_multiple(&mut self, keys: &[&str]) -> Result<bool> {
        for key in keys {
            validate_key(key)?;
        }

        let ids: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        self.store.delete_multiple(&ids)
    }
}
