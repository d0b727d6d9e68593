//! Cache Pool Module
//!
//! Item-pool cache facade with deferred writes. Pending writes are staged
//! in memory and flushed in batches grouped by common TTL, so one bulk
//! write reaches the backend per distinct lifetime instead of one per key.

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;
use tracing::debug;

use crate::error::Result;
use crate::item::{now, CacheItem};
use crate::key::validate_key;
use crate::store::Store;

// == Cache Pool ==
/// Item-pool facade over any [`Store`].
///
/// Items staged with [`save_deferred`](CachePool::save_deferred) are held
/// in memory until [`commit`](CachePool::commit) runs. Reads flush
/// pending writes first so a pool never serves stale data past its own
/// staged state, and a pool dropped with pending writes commits them.
#[derive(Debug)]
pub struct CachePool<S: Store> {
    store: S,
    deferred: HashMap<String, CacheItem>,
    /// Lifetime applied to items saved without an explicit expiry, 0 = store forever
    default_lifetime: u64,
}

impl<S: Store> CachePool<S> {
    /// Wraps a backend in the pool facade.
    pub fn new(store: S) -> Self {
        Self::with_default_lifetime(store, 0)
    }

    /// Wraps a backend, applying `default_lifetime` seconds to items
    /// saved without an explicit expiry (0 = store forever).
    pub fn with_default_lifetime(store: S, default_lifetime: u64) -> Self {
        Self {
            store,
            deferred: HashMap::new(),
            default_lifetime,
        }
    }

    /// Returns a mutable reference to the underlying backend.
    pub fn store(&mut self) -> &mut S {
        &mut self.store
    }

    // == Get Item ==
    /// Retrieves the item for `key`. Always returns an item; inspect
    /// [`CacheItem::is_hit`] to distinguish a hit from a miss.
    pub fn get_item(&mut self, key: &str) -> Result<CacheItem> {
        if !self.deferred.is_empty() {
            self.commit()?;
        }
        validate_key(key)?;

        let item = match self.store.fetch(key)? {
            Some(value) => CacheItem::hit(key, value),
            None => CacheItem::miss(key),
        };

        Ok(item.with_default_lifetime(self.default_lifetime))
    }

    // == Get Items ==
    /// Retrieves several items in one backend round-trip, returned in the
    /// order the keys were given.
    pub fn get_items(&mut self, keys: &[&str]) -> Result<Vec<CacheItem>> {
        if !self.deferred.is_empty() {
            self.commit()?;
        }
        for key in keys {
            validate_key(key)?;
        }

        let ids: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        let mut found = self.store.fetch_multiple(&ids)?;

        Ok(ids
            .into_iter()
            .map(|id| {
                let item = match found.remove(&id) {
                    Some(value) => CacheItem::hit(id, value),
                    None => CacheItem::miss(id),
                };
                item.with_default_lifetime(self.default_lifetime)
            })
            .collect())
    }

    // == Has Item ==
    /// Returns true if the pool holds an unexpired item for `key`.
    pub fn has_item(&mut self, key: &str) -> Result<bool> {
        validate_key(key)?;

        if self.deferred.contains_key(key) {
            self.commit()?;
        }

        self.store.contains(key)
    }

    // == Save ==
    /// Persists an item immediately.
    pub fn save(&mut self, item: CacheItem) -> Result<bool> {
        self.save_deferred(item);
        self.commit()
    }

    // == Save Deferred ==
    /// Stages an item to be persisted by the next [`commit`](CachePool::commit).
    /// A second deferred item for the same key replaces the first.
    pub fn save_deferred(&mut self, item: CacheItem) {
        self.deferred.insert(item.key().to_string(), item);
    }

    // == Commit ==
    /// Flushes all staged writes.
    ///
    /// Staged items are grouped by remaining TTL; already-expired items
    /// are deleted from the backend instead of written. One bulk delete
    /// covers the expired batch and one bulk write runs per distinct TTL.
    /// Returns true only if every bucket write succeeded.
    pub fn commit(&mut self) -> Result<bool> {
        let (by_lifetime, expired) = self.merge_by_lifetime();
        let mut ok = true;

        debug!(
            buckets = by_lifetime.len(),
            expired = expired.len(),
            "committing deferred cache writes"
        );

        if !expired.is_empty() {
            self.store.delete_multiple(&expired)?;
        }

        for (lifetime, values) in by_lifetime {
            let ttl = if lifetime == 0 { None } else { Some(lifetime) };

            if !self.store.save_multiple(&values, ttl)? {
                ok = false;
            }
        }

        Ok(ok)
    }

    /// Groups staged items into TTL buckets, splitting off the ids whose
    /// expiry has already passed.
    ///
    /// Remaining TTL is `trunc(0.1 + expiry - now)`; the 0.1 guard keeps
    /// items expiring a fraction of a second in the future from being
    /// misclassified as dead by clock skew. Items without an expiry fall
    /// back to their default lifetime, 0 meaning "store forever".
    fn merge_by_lifetime(&mut self) -> (BTreeMap<u64, Vec<(String, Value)>>, Vec<String>) {
        let mut by_lifetime: BTreeMap<u64, Vec<(String, Value)>> = BTreeMap::new();
        let mut expired = Vec::new();
        let now = now();

        for (key, item) in std::mem::take(&mut self.deferred) {
            let ttl = match item.expiry() {
                None => item.default_lifetime(),
                Some(expiry) => {
                    let remaining = (0.1 + expiry - now) as i64;

                    if remaining <= 0 {
                        expired.push(key);
                        continue;
                    }

                    remaining as u64
                }
            };

            by_lifetime.entry(ttl).or_default().push((key, item.into_value()));
        }

        (by_lifetime, expired)
    }

    // == Delete Item ==
    /// Removes the item for `key`, staged or persisted.
    pub fn delete_item(&mut self, key: &str) -> Result<bool> {
        self.delete_items(&[key])
    }

    // == Delete Items ==
    /// Removes several items, staged or persisted, in one backend call.
    pub fn delete_items(&mut self, keys: &[&str]) -> Result<bool> {
        for key in keys {
            validate_key(key)?;
        }

        let ids: Vec<String> = keys
            .iter()
            .map(|key| {
                self.deferred.remove(*key);
                key.to_string()
            })
            .collect();

        self.store.delete_multiple(&ids)
    }

    // == Clear ==
    /// Discards staged writes and clears the backend.
    pub fn clear(&mut self) -> Result<bool> {
        self.deferred.clear();
        self.store.flush_all()
    }
}

impl<S: Store> Drop for CachePool<S> {
    /// Flushes pending writes when the pool is discarded.
    fn drop(&mut self) {
        if !self.deferred.is_empty() {
            let _ = self.commit();
        }
    }
}
