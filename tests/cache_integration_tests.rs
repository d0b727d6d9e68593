//! Integration Tests for the Cache Facades
//!
//! Exercises the public API end to end: every facade over every built-in
//! backend, including backends constructed through the DSN registry.

use fastcache::{
    AdapterRegistry, CacheConfig, CacheError, CachePool, DecodeErrorMode, FastCache, FileStore,
    MemoryStore, SimpleCache, Store, TableStore,
};
use serde_json::{json, Value};
use std::thread::sleep;
use std::time::Duration;
use tempfile::TempDir;

// == Helpers ==
/// Runs the shared facade contract against a backend.
fn assert_simple_cache_contract<S: Store>(store: S) {
    let mut cache = SimpleCache::new(store);

    // set / get / has
    assert!(cache.set("a", json!(1), None).unwrap());
    assert!(cache.set("b", json!({"nested": [1, 2]}), None).unwrap());
    assert_eq!(cache.get("a").unwrap(), Some(json!(1)));
    assert_eq!(cache.get("b").unwrap(), Some(json!({"nested": [1, 2]})));
    assert!(cache.has("a").unwrap());

    // multi-get fills misses with null
    let values = cache.get_multiple(&["a", "b", "c"]).unwrap();
    assert_eq!(values["a"], json!(1));
    assert_eq!(values["b"], json!({"nested": [1, 2]}));
    assert_eq!(values["c"], Value::Null);

    // delete
    assert!(cache.delete("a").unwrap());
    assert!(!cache.has("a").unwrap());
    assert_eq!(cache.get("a").unwrap(), None);

    // clear twice, empty both times
    assert!(cache.clear().unwrap());
    assert!(!cache.has("b").unwrap());
    assert!(cache.clear().unwrap());
    assert!(!cache.has("b").unwrap());
}

#[test]
fn test_simple_cache_contract_on_memory() {
    assert_simple_cache_contract(MemoryStore::new());
}

#[test]
fn test_simple_cache_contract_on_file() {
    let dir = TempDir::new().unwrap();
    assert_simple_cache_contract(FileStore::new(dir.path()).unwrap());
}

#[test]
fn test_simple_cache_contract_on_sqlite() {
    assert_simple_cache_contract(TableStore::open_in_memory(None).unwrap());
}

#[test]
fn test_ttl_expiry_boundary_on_every_backend() {
    let dir = TempDir::new().unwrap();
    let stores: Vec<Box<dyn Store>> = vec![
        Box::new(MemoryStore::new()),
        Box::new(FileStore::new(dir.path()).unwrap()),
        Box::new(TableStore::open_in_memory(None).unwrap()),
    ];

    let mut caches: Vec<SimpleCache<Box<dyn Store>>> =
        stores.into_iter().map(SimpleCache::new).collect();

    for cache in &mut caches {
        cache.set("ephemeral", json!("here"), Some(1)).unwrap();
        assert!(cache.has("ephemeral").unwrap());
    }

    sleep(Duration::from_millis(1200));

    for cache in &mut caches {
        assert!(!cache.has("ephemeral").unwrap());
        assert_eq!(cache.get("ephemeral").unwrap(), None);
    }
}

#[test]
fn test_pool_deferred_writes_persist_to_disk() {
    let dir = TempDir::new().unwrap();

    {
        let mut pool = CachePool::new(FileStore::new(dir.path()).unwrap());

        let items = pool.get_items(&["a", "b"]).unwrap();
        for (mut item, n) in items.into_iter().zip(1..) {
            item.set(json!(n)).expires_after(Some(3600));
            pool.save_deferred(item);
        }
        // Dropping the pool flushes the staged writes
    }

    let mut reopened = SimpleCache::new(FileStore::new(dir.path()).unwrap());
    assert_eq!(reopened.get("a").unwrap(), Some(json!(1)));
    assert_eq!(reopened.get("b").unwrap(), Some(json!(2)));
}

#[test]
fn test_pool_save_and_expiry_roundtrip_on_sqlite() {
    let mut pool = CachePool::new(TableStore::open_in_memory(None).unwrap());

    let mut item = pool.get_item("session").unwrap();
    assert!(!item.is_hit());
    item.set(json!({"user": 1})).expires_after(Some(1));
    assert!(pool.save(item).unwrap());

    let item = pool.get_item("session").unwrap();
    assert!(item.is_hit());

    sleep(Duration::from_millis(1200));
    assert!(!pool.has_item("session").unwrap());
}

#[test]
fn test_fast_cache_compute_through_on_file_backend() {
    let dir = TempDir::new().unwrap();
    let mut cache = FastCache::with_namespace(FileStore::new(dir.path()).unwrap(), "reports.");
    let mut computations = 0;

    for _ in 0..3 {
        let value = cache
            .load_with("monthly", &mut |_, item| {
                computations += 1;
                item.expires_after(Some(3600));
                Ok(json!({"total": 1250}))
            })
            .unwrap();
        assert_eq!(value, json!({"total": 1250}));
    }

    assert_eq!(computations, 1);

    // A sibling namespace over the same directory does not see the key
    let mut other = FastCache::with_namespace(FileStore::new(dir.path()).unwrap(), "invoices.");
    assert_eq!(other.load("monthly").unwrap(), None);
}

#[test]
fn test_fast_cache_circular_fallback_fails_fast() {
    let mut cache = FastCache::new(MemoryStore::new());

    let err = cache
        .load_with("self", &mut |cache, _| {
            cache.load_with("self", &mut |_, _| Ok(json!("never")))
        })
        .unwrap_err();

    assert!(matches!(err, CacheError::CircularReference(_)));
    // The guard must not leave the key stuck
    assert_eq!(
        cache.load_with("self", &mut |_, _| Ok(json!("ok"))).unwrap(),
        json!("ok")
    );
}

#[test]
fn test_registry_end_to_end() {
    let dir = TempDir::new().unwrap();
    let registry = AdapterRegistry::with_builtins();

    let dsns = [
        "memory://".to_string(),
        format!("file://{}:cache", dir.path().display()),
        format!("sqlite://entries:{}/cache.sqlite", dir.path().display()),
    ];

    for dsn in &dsns {
        let store = registry.create(dsn).unwrap();
        let mut cache = SimpleCache::new(store);

        cache.set("k", json!("v"), None).unwrap();
        assert_eq!(cache.get("k").unwrap(), Some(json!("v")), "dsn: {}", dsn);
    }

    assert!(matches!(
        registry.create("redis://127.0.0.1:6379").unwrap_err(),
        CacheError::Configuration(_)
    ));
}

#[test]
fn test_reserved_characters_rejected_by_every_facade() {
    let bad_key = "bad{}()/\\@:key";

    let mut simple = SimpleCache::new(MemoryStore::new());
    assert!(matches!(
        simple.set(bad_key, json!(1), None).unwrap_err(),
        CacheError::InvalidKey { .. }
    ));

    let mut pool = CachePool::new(MemoryStore::new());
    assert!(matches!(
        pool.get_item(bad_key).unwrap_err(),
        CacheError::InvalidKey { .. }
    ));

    let mut fast = FastCache::new(MemoryStore::new());
    let err = fast.load(bad_key).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("reserved"));
}

#[test]
fn test_decode_error_mode_is_a_configuration_choice() {
    let dir = TempDir::new().unwrap();

    // Write a value, then corrupt the file behind the store's back
    let mut cache = SimpleCache::new(FileStore::new(dir.path()).unwrap());
    cache.set("k", json!(1), None).unwrap();
    let file = std::fs::read_dir(dir.path())
        .unwrap()
        .next()
        .unwrap()
        .unwrap()
        .path();
    std::fs::write(&file, b"garbage").unwrap();

    // Default mode: miss
    assert_eq!(cache.get("k").unwrap(), None);

    // Error mode: surfaced
    let strict = FileStore::new(dir.path())
        .unwrap()
        .decode_errors(DecodeErrorMode::Error);
    let mut strict = SimpleCache::new(strict);
    std::fs::write(&file, b"garbage").unwrap();
    assert!(matches!(
        strict.get("k").unwrap_err(),
        CacheError::Decode { .. }
    ));
}

#[test]
fn test_config_defaults_flow_into_memory_store() {
    let config = CacheConfig::default();
    let mut pool = CachePool::with_default_lifetime(
        MemoryStore::with_capacity(config.max_entries),
        config.default_ttl,
    );

    let mut item = pool.get_item("k").unwrap();
    item.set(json!("stored forever"));
    assert!(pool.save(item).unwrap());
    assert!(pool.has_item("k").unwrap());
}
