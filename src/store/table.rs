//! Table Store Module
//!
//! SQLite table-backed backend: a database table used as a cache, with
//! lazy expiry on the read path.

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::DecodeErrorMode;
use crate::error::{CacheError, Result};
use crate::item::now;
use crate::store::Store;

/// Default table name when none is given.
const DEFAULT_TABLE: &str = "cache_items";

// == Table Store ==
/// Database-table-as-cache backend over SQLite.
///
/// The table is created idempotently at construction. Rows hold the id,
/// the JSON-encoded value and an optional absolute expiry; reads compare
/// the expiry column to the current time and delete stale rows before
/// reporting a miss.
#[derive(Debug)]
pub struct TableStore {
    conn: Connection,
    table: String,
    decode_errors: DecodeErrorMode,
}

impl TableStore {
    /// Opens (or creates) the cache table in the database at `path`.
    pub fn open(path: impl AsRef<Path>, table: Option<&str>) -> Result<Self> {
        Self::with_connection(Connection::open(path)?, table)
    }

    /// Opens an in-memory database. Useful for tests and scratch caches.
    pub fn open_in_memory(table: Option<&str>) -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?, table)
    }

    fn with_connection(conn: Connection, table: Option<&str>) -> Result<Self> {
        let table = table.unwrap_or(DEFAULT_TABLE).to_string();

        // Table name is interpolated into SQL below, so restrict it to a
        // plain identifier.
        if table.is_empty()
            || !table
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(CacheError::Configuration(format!(
                "invalid cache table name {:?}",
                table
            )));
        }

        let store = Self {
            conn,
            table,
            decode_errors: DecodeErrorMode::Miss,
        };
        store.ensure_table_exists()?;

        Ok(store)
    }

    /// Sets the behavior for undecodable rows.
    pub fn decode_errors(mut self, mode: DecodeErrorMode) -> Self {
        self.decode_errors = mode;
        self
    }

    /// Creates the cache table if it does not exist yet. Idempotent; runs
    /// once at construction.
    fn ensure_table_exists(&self) -> Result<()> {
        self.conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    id TEXT PRIMARY KEY,
                    data TEXT NOT NULL,
                    expire REAL
                )",
                self.table
            ),
            [],
        )?;

        Ok(())
    }

    /// Returns the raw stored row for `id`, deleting and skipping it when
    /// its expiry has passed.
    fn find_row(&mut self, id: &str) -> Result<Option<String>> {
        let row: Option<(String, Option<f64>)> = self
            .conn
            .query_row(
                &format!("SELECT data, expire FROM {} WHERE id = ?1", self.table),
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((data, expire)) = row else {
            return Ok(None);
        };

        if matches!(expire, Some(at) if now() >= at) {
            self.delete(id)?;
            return Ok(None);
        }

        Ok(Some(data))
    }

    /// Deletes every row whose expiry lies at or before `threshold`
    /// (seconds since the Unix epoch). Returns the number of rows removed.
    pub fn evict_expired(&mut self, threshold: f64) -> Result<usize> {
        let removed = self.conn.execute(
            &format!(
                "DELETE FROM {} WHERE expire IS NOT NULL AND expire <= ?1",
                self.table
            ),
            params![threshold],
        )?;

        if removed > 0 {
            debug!(removed, "evicted expired cache rows");
        }

        Ok(removed)
    }

    /// Number of rows currently stored, including not-yet-evicted expired ones.
    pub fn len(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", self.table),
            [],
            |row| row.get(0),
        )?;

        Ok(count as usize)
    }

    /// Returns true if the table holds no rows.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl Store for TableStore {
    fn contains(&mut self, id: &str) -> Result<bool> {
        Ok(self.find_row(id)?.is_some())
    }

    fn fetch(&mut self, id: &str) -> Result<Option<Value>> {
        let Some(data) = self.find_row(id)? else {
            return Ok(None);
        };

        match serde_json::from_str(&data) {
            Ok(value) => Ok(Some(value)),
            Err(source) => match self.decode_errors {
                DecodeErrorMode::Miss => {
                    warn!(id, "undecodable cache row treated as miss");
                    Ok(None)
                }
                DecodeErrorMode::Error => Err(CacheError::Decode {
                    key: id.to_string(),
                    source,
                }),
            },
        }
    }

    fn save(&mut self, id: &str, value: &Value, ttl: Option<u64>) -> Result<bool> {
        let data = serde_json::to_string(value).map_err(CacheError::Encode)?;
        let expire = ttl.map(|secs| now() + secs as f64);

        self.conn.execute(
            &format!(
                "INSERT INTO {} (id, data, expire) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET data = excluded.data, expire = excluded.expire",
                self.table
            ),
            params![id, data, expire],
        )?;

        Ok(true)
    }

    fn delete(&mut self, id: &str) -> Result<bool> {
        let removed = self.conn.execute(
            &format!("DELETE FROM {} WHERE id = ?1", self.table),
            params![id],
        )?;

        Ok(removed > 0)
    }

    fn flush_all(&mut self) -> Result<bool> {
        self.conn
            .execute(&format!("DELETE FROM {}", self.table), [])?;

        Ok(true)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::thread::sleep;
    use std::time::Duration;
    use tempfile::TempDir;

    fn store() -> TableStore {
        TableStore::open_in_memory(None).unwrap()
    }

    #[test]
    fn test_save_and_fetch() {
        let mut store = store();

        store.save("key1", &json!({"n": 1}), None).unwrap();

        assert!(store.contains("key1").unwrap());
        assert_eq!(store.fetch("key1").unwrap(), Some(json!({"n": 1})));
    }

    #[test]
    fn test_upsert_overwrites() {
        let mut store = store();

        store.save("key1", &json!("old"), None).unwrap();
        store.save("key1", &json!("new"), Some(60)).unwrap();

        assert_eq!(store.fetch("key1").unwrap(), Some(json!("new")));
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn test_delete() {
        let mut store = store();

        store.save("key1", &json!(1), None).unwrap();
        assert!(store.delete("key1").unwrap());
        assert!(!store.delete("key1").unwrap());
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_expired_row_removed_on_read() {
        let mut store = store();

        store.save("key1", &json!(1), Some(1)).unwrap();
        sleep(Duration::from_millis(1100));

        assert_eq!(store.fetch("key1").unwrap(), None);
        // The stale row was deleted, not just skipped
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_flush_all() {
        let mut store = store();

        store.save("a", &json!(1), None).unwrap();
        store.save("b", &json!(2), None).unwrap();

        assert!(store.flush_all().unwrap());
        assert!(store.is_empty().unwrap());
        // Idempotent
        assert!(store.flush_all().unwrap());
    }

    #[test]
    fn test_evict_expired_threshold() {
        let mut store = store();

        store.save("soon", &json!(1), Some(1)).unwrap();
        store.save("later", &json!(2), Some(3600)).unwrap();
        store.save("forever", &json!(3), None).unwrap();

        sleep(Duration::from_millis(1100));

        let removed = store.evict_expired(now()).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.len().unwrap(), 2);
    }

    #[test]
    fn test_table_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.sqlite");

        {
            let mut store = TableStore::open(&path, Some("my_cache")).unwrap();
            store.save("key1", &json!("durable"), None).unwrap();
        }

        // ensure_table_exists must tolerate the existing table
        let mut store = TableStore::open(&path, Some("my_cache")).unwrap();
        assert_eq!(store.fetch("key1").unwrap(), Some(json!("durable")));
    }

    #[test]
    fn test_invalid_table_name_rejected() {
        let err = TableStore::open_in_memory(Some("bad; DROP TABLE x")).unwrap_err();
        assert!(matches!(err, CacheError::Configuration(_)));
    }

    #[test]
    fn test_undecodable_row_modes() {
        let mut store = store();
        store.save("key1", &json!(1), None).unwrap();
        store
            .conn
            .execute(
                "UPDATE cache_items SET data = 'not json' WHERE id = 'key1'",
                [],
            )
            .unwrap();

        assert_eq!(store.fetch("key1").unwrap(), None);

        let mut store = store.decode_errors(DecodeErrorMode::Error);
        let err = store.fetch("key1").unwrap_err();
        assert!(matches!(err, CacheError::Decode { .. }));
    }
}
