//! Adapter Registry Module
//!
//! Maps DSN schemes to backend constructors. The registry is populated
//! with the built-in backends at startup and stays open for extension:
//! registering a new scheme needs no change to the dispatch code.

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;

use tracing::debug;

use crate::error::{CacheError, Result};
use crate::store::{FileStore, MemoryStore, Store, TableStore};

// == DSN ==
/// A parsed backend connection string.
///
/// Supported shapes:
/// - `scheme://host:port` (server backends), e.g. `redis://127.0.0.1:6379`
/// - `file:///path[:extension]`, e.g. `file:///tmp/cache:ext`
/// - `sqlite://table:/path/db.sqlite`
/// - `memory://` (no location)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dsn {
    /// Backend scheme, lowercased
    pub scheme: String,
    /// Server host, for `host:port` shapes
    pub host: Option<String>,
    /// Server port, for `host:port` shapes
    pub port: Option<u16>,
    /// Filesystem path, for file/database shapes
    pub path: Option<PathBuf>,
    /// Scheme-specific qualifier: file extension or table name
    pub label: Option<String>,
}

impl FromStr for Dsn {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        let (scheme, rest) = s.split_once("://").ok_or_else(|| {
            CacheError::Configuration(format!("DSN {:?} is missing a scheme", s))
        })?;

        if scheme.is_empty() {
            return Err(CacheError::Configuration(format!(
                "DSN {:?} is missing a scheme",
                s
            )));
        }

        let mut dsn = Self {
            scheme: scheme.to_ascii_lowercase(),
            host: None,
            port: None,
            path: None,
            label: None,
        };

        if rest.is_empty() {
            return Ok(dsn);
        }

        if let Some(stripped) = rest.strip_prefix('/') {
            // Path shape: /path, optionally followed by :extension
            match stripped.rsplit_once(':') {
                Some((path, label)) if !label.contains('/') && !label.is_empty() => {
                    dsn.path = Some(PathBuf::from(format!("/{}", path)));
                    dsn.label = Some(label.to_string());
                }
                _ => dsn.path = Some(PathBuf::from(rest)),
            }
        } else if let Some((label, path)) = rest.split_once(":/") {
            // Qualified path shape: table:/path/db.sqlite
            dsn.label = Some(label.to_string());
            dsn.path = Some(PathBuf::from(format!("/{}", path)));
        } else {
            // Server shape: host[:port]
            match rest.split_once(':') {
                Some((host, port)) => {
                    let port = port.parse().map_err(|_| {
                        CacheError::Configuration(format!("DSN {:?} has an invalid port", s))
                    })?;
                    dsn.host = Some(host.to_string());
                    dsn.port = Some(port);
                }
                None => dsn.host = Some(rest.to_string()),
            }
        }

        Ok(dsn)
    }
}

impl Dsn {
    /// Returns the path or a configuration error naming the scheme.
    fn require_path(&self) -> Result<&PathBuf> {
        self.path.as_ref().ok_or_else(|| {
            CacheError::Configuration(format!("{} DSN requires a path", self.scheme))
        })
    }
}

// == Adapter Registry ==
/// Constructor function building a backend from a parsed DSN.
pub type StoreFactory = Box<dyn Fn(&Dsn) -> Result<Box<dyn Store>>>;

/// Registry mapping DSN schemes to backend constructors.
///
/// Lookup is by exact scheme match. An unknown scheme is a
/// configuration error raised at construction time, not on first use.
pub struct AdapterRegistry {
    factories: HashMap<String, StoreFactory>,
}

impl AdapterRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Creates a registry with the built-in backends registered:
    /// `memory`/`array`, `file`, and `sqlite`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();

        registry.register("memory", |_| Ok(Box::new(MemoryStore::new())));
        registry.register("array", |_| Ok(Box::new(MemoryStore::new())));

        registry.register("file", |dsn| {
            let path = dsn.require_path()?;
            let store = match dsn.label.as_deref() {
                Some(extension) => FileStore::with_extension(path, extension)?,
                None => FileStore::new(path)?,
            };
            Ok(Box::new(store))
        });

        registry.register("sqlite", |dsn| {
            let path = dsn.require_path()?;
            Ok(Box::new(TableStore::open(path, dsn.label.as_deref())?))
        });

        registry
    }

    /// Registers (or replaces) the constructor for a scheme.
    pub fn register<F>(&mut self, scheme: &str, factory: F)
    where
        F: Fn(&Dsn) -> Result<Box<dyn Store>> + 'static,
    {
        self.factories
            .insert(scheme.to_ascii_lowercase(), Box::new(factory));
    }

    /// Builds a backend from a DSN string.
    pub fn create(&self, dsn: &str) -> Result<Box<dyn Store>> {
        let dsn: Dsn = dsn.parse()?;

        let factory = self.factories.get(&dsn.scheme).ok_or_else(|| {
            CacheError::Configuration(format!("unsupported cache adapter {:?}", dsn.scheme))
        })?;

        debug!(scheme = %dsn.scheme, "creating cache backend");
        factory(&dsn)
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut schemes: Vec<&String> = self.factories.keys().collect();
        schemes.sort();
        f.debug_struct("AdapterRegistry")
            .field("schemes", &schemes)
            .finish()
    }
}
