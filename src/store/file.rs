//! File Store Module
//!
//! Filesystem backend storing one JSON envelope file per entry.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::config::DecodeErrorMode;
use crate::error::{CacheError, Result};
use crate::item::now;
use crate::store::Store;

/// Default extension for cache files.
const DEFAULT_EXTENSION: &str = "cache";

// == Envelope ==
/// On-disk representation of a single entry. The expiry travels with the
/// value so a reader needs no side index.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    value: Value,
    /// Absolute expiry as seconds since the Unix epoch, None = no expiration
    expires_at: Option<f64>,
}

// == File Store ==
/// Filesystem backend: one JSON file per id under a directory.
///
/// Expired entries are deleted lazily when a read discovers them. What
/// happens on an undecodable file is governed by [`DecodeErrorMode`].
#[derive(Debug)]
pub struct FileStore {
    directory: PathBuf,
    extension: String,
    decode_errors: DecodeErrorMode,
}

impl FileStore {
    /// Creates a file store rooted at `directory`, creating it if needed.
    pub fn new(directory: impl AsRef<Path>) -> Result<Self> {
        Self::with_extension(directory, DEFAULT_EXTENSION)
    }

    /// Creates a file store using a custom file extension.
    pub fn with_extension(directory: impl AsRef<Path>, extension: &str) -> Result<Self> {
        let directory = directory.as_ref().to_path_buf();
        fs::create_dir_all(&directory)?;

        Ok(Self {
            directory,
            extension: extension.trim_start_matches('.').to_string(),
            decode_errors: DecodeErrorMode::Miss,
        })
    }

    /// Sets the behavior for undecodable files.
    pub fn decode_errors(mut self, mode: DecodeErrorMode) -> Self {
        self.decode_errors = mode;
        self
    }

    /// Maps an id to its file path. Ids are escaped so any validated key
    /// (plus namespace prefixes) yields a safe file name.
    fn path_for(&self, id: &str) -> PathBuf {
        let mut name = String::with_capacity(id.len());

        for b in id.bytes() {
            match b {
                b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'.' | b'_' | b'-' => {
                    name.push(b as char)
                }
                _ => name.push_str(&format!("%{:02x}", b)),
            }
        }

        self.directory.join(format!("{}.{}", name, self.extension))
    }

    /// Reads and decodes the envelope for `id`, applying the configured
    /// decode-error mode. Expired envelopes are deleted and reported as
    /// absent.
    fn read_envelope(&mut self, id: &str) -> Result<Option<Envelope>> {
        let path = self.path_for(id);

        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let envelope: Envelope = match serde_json::from_slice(&raw) {
            Ok(envelope) => envelope,
            Err(source) => {
                return match self.decode_errors {
                    DecodeErrorMode::Miss => {
                        warn!(id, "undecodable cache file treated as miss");
                        Ok(None)
                    }
                    DecodeErrorMode::Error => Err(CacheError::Decode {
                        key: id.to_string(),
                        source,
                    }),
                };
            }
        };

        if matches!(envelope.expires_at, Some(at) if now() >= at) {
            fs::remove_file(&path)?;
            return Ok(None);
        }

        Ok(Some(envelope))
    }
}

impl Store for FileStore {
    fn contains(&mut self, id: &str) -> Result<bool> {
        Ok(self.read_envelope(id)?.is_some())
    }

    fn fetch(&mut self, id: &str) -> Result<Option<Value>> {
        Ok(self.read_envelope(id)?.map(|envelope| envelope.value))
    }

    fn save(&mut self, id: &str, value: &Value, ttl: Option<u64>) -> Result<bool> {
        let envelope = Envelope {
            value: value.clone(),
            expires_at: ttl.map(|secs| now() + secs as f64),
        };
        let raw = serde_json::to_vec(&envelope).map_err(CacheError::Encode)?;

        fs::write(self.path_for(id), raw)?;

        Ok(true)
    }

    fn delete(&mut self, id: &str) -> Result<bool> {
        match fs::remove_file(self.path_for(id)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn flush_all(&mut self) -> Result<bool> {
        let suffix = format!(".{}", self.extension);

        for entry in fs::read_dir(&self.directory)? {
            let path = entry?.path();
            let is_cache_file = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(&suffix));

            if is_cache_file {
                fs::remove_file(path)?;
            }
        }

        Ok(true)
    }
}
