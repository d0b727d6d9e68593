//! Store Module
//!
//! Defines the backend contract consumed by every cache facade, plus the
//! built-in backends (in-memory, filesystem, SQLite table).

mod file;
mod memory;
mod stats;
mod table;

use std::collections::HashMap;

use serde_json::Value;

use crate::error::Result;

// Re-export public types
pub use file::FileStore;
pub use memory::MemoryStore;
pub use stats::StoreStats;
pub use table::TableStore;

// == Store Trait ==
/// The backend contract every cache facade operates on.
///
/// The five core operations are required. The bulk operations have
/// default implementations that loop one key at a time; backends with
/// native multi-key support override them, and facades always call the
/// bulk form so the cheapest available path is taken. This replaces
/// runtime capability checks on concrete backend types.
///
/// TTLs are in whole seconds; `None` means the entry never expires.
pub trait Store {
    /// Returns true if an unexpired entry exists for `id`.
    fn contains(&mut self, id: &str) -> Result<bool>;

    /// Fetches the value stored under `id`, or `None` on a miss.
    fn fetch(&mut self, id: &str) -> Result<Option<Value>>;

    /// Stores `value` under `id`. Returns false if the backend refused the write.
    fn save(&mut self, id: &str, value: &Value, ttl: Option<u64>) -> Result<bool>;

    /// Removes the entry for `id`. Returns true if an entry was removed.
    fn delete(&mut self, id: &str) -> Result<bool>;

    /// Removes every entry. Returns false if the backend could not be cleared.
    fn flush_all(&mut self) -> Result<bool>;

    /// Fetches several ids at once; the result contains only the ids found.
    fn fetch_multiple(&mut self, ids: &[String]) -> Result<HashMap<String, Value>> {
        let mut found = HashMap::with_capacity(ids.len());

        for id in ids {
            if let Some(value) = self.fetch(id)? {
                found.insert(id.clone(), value);
            }
        }

        Ok(found)
    }

    /// Stores several entries with a shared TTL. Returns true only if every write succeeded.
    fn save_multiple(&mut self, values: &[(String, Value)], ttl: Option<u64>) -> Result<bool> {
        let mut ok = true;

        for (id, value) in values {
            ok &= self.save(id, value, ttl)?;
        }

        Ok(ok)
    }

    /// Removes several entries. Every id is processed; returns true only
    /// if every id named an existing entry.
    fn delete_multiple(&mut self, ids: &[String]) -> Result<bool> {
        let mut ok = true;

        for id in ids {
            ok &= self.delete(id)?;
        }

        Ok(ok)
    }
}

impl std::fmt::Debug for dyn Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn Store")
    }
}

// == Borrowed Store ==
/// Forwarding impl so facades can borrow a store instead of owning it.
impl<S: Store + ?Sized> Store for &mut S {
    fn contains(&mut self, id: &str) -> Result<bool> {
        (**self).contains(id)
    }

    fn fetch(&mut self, id: &str) -> Result<Option<Value>> {
        (**self).fetch(id)
    }

    fn save(&mut self, id: &str, value: &Value, ttl: Option<u64>) -> Result<bool> {
        (**self).save(id, value, ttl)
    }

    fn delete(&mut self, id: &str) -> Result<bool> {
        (**self).delete(id)
    }

    fn flush_all(&mut self) -> Result<bool> {
        (**self).flush_all()
    }

    fn fetch_multiple(&mut self, ids: &[String]) -> Result<HashMap<String, Value>> {
        (**self).fetch_multiple(ids)
    }

    fn save_multiple(&mut self, values: &[(String, Value)], ttl: Option<u64>) -> Result<bool> {
        (**self).save_multiple(values, ttl)
    }

    fn delete_multiple(&mut self, ids: &[String]) -> Result<bool> {
        (**self).delete_multiple(ids)
    }
}

// == Boxed Store ==
/// Forwarding impl so registry-built `Box<dyn Store>` backends can be
/// used wherever a concrete store is expected.
impl Store for Box<dyn Store> {
    fn contains(&mut self, id: &str) -> Result<bool> {
        (**self).contains(id)
    }

    fn fetch(&mut self, id: &str) -> Result<Option<Value>> {
        (**self).fetch(id)
    }

    fn save(&mut self, id: &str, value: &Value, ttl: Option<u64>) -> Result<bool> {
        (**self).save(id, value, ttl)
    }

    fn delete(&mut self, id: &str) -> Result<bool> {
        (**self).delete(id)
    }

    fn flush_all(&mut self) -> Result<bool> {
        (**self).flush_all()
    }

    fn fetch_multiple(&mut self, ids: &[String]) -> Result<HashMap<String, Value>> {
        (**self).fetch_multiple(ids)
    }

    fn save_multiple(&mut self, values: &[(String, Value)], ttl: Option<u64>) -> Result<bool> {
        (**self).save_multiple(values, ttl)
    }

    fn delete_multiple(&mut self, ids: &[String]) -> Result<bool> {
        (**self).delete_multiple(ids)
    }
}
