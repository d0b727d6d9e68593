//! Fastcache - A caching abstraction library
//!
//! Provides an item-pool cache with deferred writes, a simple key-value
//! cache, and a compute-through cache layer, all over pluggable backends
//! (in-memory, filesystem, SQLite table).

pub mod config;
pub mod error;
pub mod fast;
pub mod item;
pub mod key;
pub mod pool;
pub mod registry;
pub mod simple;
pub mod store;


pub use config::{CacheConfig, DecodeErrorMode};
pub use error::{CacheError, Result};
pub use fast::FastCache;
pub use item::CacheItem;
pub use pool::CachePool;
pub use registry::{AdapterRegistry, Dsn};
pub use simple::SimpleCache;
pub use store::{FileStore, MemoryStore, Store, TableStore};
