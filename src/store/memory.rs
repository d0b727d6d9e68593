//! Memory Store Module
//!
//! In-memory backend combining HashMap storage with LRU capacity
//! eviction and per-entry expiry.

use std::collections::{HashMap, VecDeque};

use serde_json::Value;
use tracing::debug;

use crate::error::Result;
use crate::item::now;
use crate::store::{Store, StoreStats};

// == Memory Entry ==
#[derive(Debug, Clone)]
struct MemoryEntry {
    value: Value,
    /// Absolute expiry as seconds since the Unix epoch, None = no expiration
    expires_at: Option<f64>,
}

impl MemoryEntry {
    fn new(value: Value, ttl: Option<u64>) -> Self {
        Self {
            value,
            expires_at: ttl.map(|secs| now() + secs as f64),
        }
    }

    /// An entry is expired once the current time reaches its expiry.
    fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(at) => now() >= at,
            None => false,
        }
    }
}

// == Access Order ==
/// Tracks access recency for LRU eviction.
///
/// Front = most recently used, back = least recently used.
#[derive(Debug, Default)]
struct AccessOrder {
    order: VecDeque<String>,
}

impl AccessOrder {
    /// Marks an id as recently used (moves it to the front).
    fn touch(&mut self, id: &str) {
        self.remove(id);
        self.order.push_front(id.to_string());
    }

    fn remove(&mut self, id: &str) {
        self.order.retain(|k| k != id);
    }

    /// Returns and removes the least recently used id.
    fn evict_oldest(&mut self) -> Option<String> {
        self.order.pop_back()
    }
}

// == Memory Store ==
/// In-memory backend with LRU eviction and TTL support.
///
/// Overrides the bulk operations of [`Store`] natively, so the pool's
/// commit batching maps onto single passes over the map.
#[derive(Debug)]
pub struct MemoryStore {
    entries: HashMap<String, MemoryEntry>,
    lru: AccessOrder,
    stats: StoreStats,
    /// Maximum number of entries, None = unbounded
    max_entries: Option<usize>,
}

impl MemoryStore {
    /// Creates an unbounded memory store.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            lru: AccessOrder::default(),
            stats: StoreStats::new(),
            max_entries: None,
        }
    }

    /// Creates a memory store holding at most `max_entries` entries;
    /// the least recently used entry is evicted when full.
    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            max_entries: Some(max_entries),
            ..Self::new()
        }
    }

    /// Returns current store statistics.
    pub fn stats(&self) -> StoreStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }

    /// Returns the current number of entries, including not-yet-evicted
    /// expired ones.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes all expired entries, returning how many were dropped.
    pub fn evict_expired(&mut self) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(id, _)| id.clone())
            .collect();

        for id in &expired {
            self.entries.remove(id);
            self.lru.remove(id);
            self.stats.record_eviction();
        }

        if !expired.is_empty() {
            debug!(count = expired.len(), "evicted expired entries");
        }

        expired.len()
    }

    /// Drops an entry discovered to be expired during a read.
    fn drop_expired(&mut self, id: &str) {
        self.entries.remove(id);
        self.lru.remove(id);
        self.stats.record_eviction();
    }

    /// Makes room for one more entry when at capacity.
    fn make_room(&mut self, incoming: &str) {
        let Some(max) = self.max_entries else { return };

        if self.entries.contains_key(incoming) || self.entries.len() < max {
            return;
        }

        // Expired entries go first; fall back to LRU order.
        if self.evict_expired() > 0 && self.entries.len() < max {
            return;
        }

        if let Some(oldest) = self.lru.evict_oldest() {
            debug!(id = %oldest, "evicted least recently used entry");
            self.entries.remove(&oldest);
            self.stats.record_eviction();
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for MemoryStore {
    fn contains(&mut self, id: &str) -> Result<bool> {
        match self.entries.get(id) {
            Some(entry) if entry.is_expired() => {
                self.drop_expired(id);
                Ok(false)
            }
            Some(_) => Ok(true),
            None => Ok(false),
        }
    }

    fn fetch(&mut self, id: &str) -> Result<Option<Value>> {
        match self.entries.get(id) {
            Some(entry) if entry.is_expired() => {
                self.drop_expired(id);
                self.stats.record_miss();
                Ok(None)
            }
            Some(entry) => {
                let value = entry.value.clone();
                self.stats.record_hit();
                self.lru.touch(id);
                Ok(Some(value))
            }
            None => {
                self.stats.record_miss();
                Ok(None)
            }
        }
    }

    fn save(&mut self, id: &str, value: &Value, ttl: Option<u64>) -> Result<bool> {
        self.make_room(id);
        self.entries
            .insert(id.to_string(), MemoryEntry::new(value.clone(), ttl));
        self.lru.touch(id);
        self.stats.record_write();
        Ok(true)
    }

    fn delete(&mut self, id: &str) -> Result<bool> {
        let removed = self.entries.remove(id).is_some();
        self.lru.remove(id);
        Ok(removed)
    }

    fn flush_all(&mut self) -> Result<bool> {
        self.entries.clear();
        self.lru = AccessOrder::default();
        Ok(true)
    }

    // Native bulk operations: one pass over the map each.

    fn fetch_multiple(&mut self, ids: &[String]) -> Result<HashMap<String, Value>> {
        let mut found = HashMap::with_capacity(ids.len());

        for id in ids {
            if let Some(value) = self.fetch(id)? {
                found.insert(id.clone(), value);
            }
        }

        Ok(found)
    }

    fn save_multiple(&mut self, values: &[(String, Value)], ttl: Option<u64>) -> Result<bool> {
        for (id, value) in values {
            self.save(id, value, ttl)?;
        }

        Ok(true)
    }

    fn delete_multiple(&mut self, ids: &[String]) -> Result<bool> {
        let mut ok = true;

        for id in ids {
            ok &= self.delete(id)?;
        }

        Ok(ok)
    }
}
