//! Fast Cache Module
//!
//! Compute-through cache layer: reads a value or generates it with a
//! fallback callback, guarding against a callback recursively requesting
//! the key it is currently computing.

use std::collections::{HashMap, HashSet};

use serde_json::Value;
use tracing::{debug, trace};

use crate::error::{CacheError, Result};
use crate::item::{now, CacheItem};
use crate::key::validate_key;
use crate::store::Store;

// == Fast Cache ==
/// Compute-through facade over any [`Store`].
///
/// Keys live under a namespace prefix; [`derive`](FastCache::derive)
/// produces a nested namespace sharing the same backend. Values are
/// generated by fallback callbacks, which receive the cache itself (so
/// they may load other keys) and the miss item (so they may set an
/// expiry on the computed value).
#[derive(Debug)]
pub struct FastCache<S> {
    store: S,
    namespace: String,
    /// Keys whose value-producing callback is currently running
    computing: HashSet<String>,
}

/// Callback computing the value for one key.
///
/// Receives the cache for nested loads and the miss item for setting
/// expiry metadata on the computed value.
pub type Fallback<'a, S> = &'a mut dyn FnMut(&mut FastCache<S>, &mut CacheItem) -> Result<Value>;

impl<S: Store> FastCache<S> {
    /// Wraps a backend with an empty namespace.
    pub fn new(store: S) -> Self {
        Self::with_namespace(store, "")
    }

    /// Wraps a backend under the given namespace prefix.
    pub fn with_namespace(store: S, namespace: &str) -> Self {
        Self {
            store,
            namespace: namespace.to_string(),
            computing: HashSet::new(),
        }
    }

    /// Returns the namespace prefix.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns a mutable reference to the underlying backend.
    pub fn store(&mut self) -> &mut S {
        &mut self.store
    }

    /// Returns a nested cache whose namespace extends this one, sharing
    /// the same backend.
    pub fn derive(self, namespace: &str) -> Self {
        Self {
            namespace: format!("{}{}", self.namespace, namespace),
            ..self
        }
    }

    /// Maps a validated user key to its namespaced backend id.
    fn id(&self, key: &str) -> String {
        format!("{}{}", self.namespace, key)
    }

    // == Load ==
    /// Reads the value for `key`, or `None` on a miss.
    pub fn load(&mut self, key: &str) -> Result<Option<Value>> {
        validate_key(key)?;

        let id = self.id(key);
        self.store.fetch(&id)
    }

    /// Reads the value for `key`, generating and storing it with
    /// `fallback` on a miss.
    pub fn load_with(&mut self, key: &str, fallback: Fallback<'_, S>) -> Result<Value> {
        validate_key(key)?;

        let id = self.id(key);
        if let Some(value) = self.store.fetch(&id)? {
            trace!(key, "fast cache hit");
            return Ok(value);
        }

        self.do_create(key, fallback)
    }

    // == Bulk Load ==
    /// Reads several keys at once; misses map to `Value::Null`.
    pub fn bulk_load(&mut self, keys: &[&str]) -> Result<HashMap<String, Value>> {
        for key in keys {
            validate_key(key)?;
        }

        let ids: Vec<String> = keys.iter().map(|k| self.id(k)).collect();
        let mut found = self.store.fetch_multiple(&ids)?;

        Ok(keys
            .iter()
            .zip(ids)
            .map(|(key, id)| {
                let value = found.remove(&id).unwrap_or(Value::Null);
                (key.to_string(), value)
            })
            .collect())
    }

    /// Reads several keys at once, generating each miss with `fallback`.
    ///
    /// The fallback is invoked once per missing key and receives that key
    /// through the item passed to it.
    pub fn bulk_load_with(
        &mut self,
        keys: &[&str],
        fallback: Fallback<'_, S>,
    ) -> Result<HashMap<String, Value>> {
        for key in keys {
            validate_key(key)?;
        }

        let ids: Vec<String> = keys.iter().map(|k| self.id(k)).collect();
        let mut found = self.store.fetch_multiple(&ids)?;
        let mut result = HashMap::with_capacity(keys.len());

        for (key, id) in keys.iter().zip(ids) {
            let value = match found.remove(&id) {
                Some(value) => value,
                None => self.do_create(key, &mut *fallback)?,
            };
            result.insert(key.to_string(), value);
        }

        Ok(result)
    }

    // == Save ==
    /// Generates and stores the value for `key`.
    ///
    /// `beta` tunes recompute eagerness: it must be non-negative, and
    /// `f64::INFINITY` forces recomputation even when a value exists.
    /// Any other value returns the existing entry untouched when present.
    pub fn save(&mut self, key: &str, callback: Fallback<'_, S>, beta: Option<f64>) -> Result<Value> {
        validate_key(key)?;

        let beta = beta.unwrap_or(1.0);
        if beta < 0.0 {
            return Err(CacheError::InvalidArgument(format!(
                "beta must be a positive number, {} given",
                beta
            )));
        }

        if beta != f64::INFINITY {
            let id = self.id(key);
            if let Some(existing) = self.store.fetch(&id)? {
                return Ok(existing);
            }
        }

        self.do_create(key, callback)
    }

    // == Delete ==
    /// Removes the value for `key`. Returns true if a value was removed.
    pub fn delete(&mut self, key: &str) -> Result<bool> {
        validate_key(key)?;

        let id = self.id(key);
        self.store.delete(&id)
    }

    /// Runs the value-producing callback for `key` under the
    /// recursive-build guard, then persists the result.
    ///
    /// While the callback runs, the key sits in the computing set; a
    /// nested request for the same key fails fast with
    /// [`CacheError::CircularReference`] instead of recursing. The set
    /// entry is removed on every exit path. When the callback fails, the
    /// key is deleted from the backend before the error propagates so no
    /// partial value survives.
    fn do_create(&mut self, key: &str, callback: Fallback<'_, S>) -> Result<Value> {
        let id = self.id(key);

        if self.computing.contains(&id) {
            return Err(CacheError::CircularReference(key.to_string()));
        }

        debug!(key, "computing cache value");
        self.computing.insert(id.clone());

        let mut item = CacheItem::miss(key);
        let result = callback(&mut *self, &mut item);
        self.computing.remove(&id);

        let value = match result {
            Ok(value) => value,
            Err(e) => {
                let _ = self.store.delete(&id);
                return Err(e);
            }
        };

        // A computed null means "nothing to cache": drop any stored value.
        if value.is_null() {
            self.store.delete(&id)?;
            return Ok(value);
        }

        let ttl = match item.expiry() {
            Some(expiry) => {
                let remaining = (0.1 + expiry - now()) as i64;

                if remaining <= 0 {
                    // Expired before it was ever stored
                    self.store.delete(&id)?;
                    return Ok(value);
                }

                Some(remaining as u64)
            }
            None => None,
        };

        self.store.save(&id, &value, ttl)?;

        Ok(value)
    }
}
