//! Key Validation Module
//!
//! Validates cache keys before they reach any backend.

use crate::error::{CacheError, Result};

// == Public Constants ==
/// Characters that cannot appear in a cache key.
pub const RESERVED_CHARACTERS: &str = "{}()/\\@:";

/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;

// == Validate Key ==
/// Validates a cache key.
///
/// A valid key is a non-empty string of at most [`MAX_KEY_LENGTH`] bytes
/// containing none of the [`RESERVED_CHARACTERS`].
///
/// # Errors
/// Returns [`CacheError::InvalidKey`] naming the offending characters
/// when validation fails. Validation always runs before any backend call.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CacheError::InvalidKey {
            key: key.to_string(),
            reason: "key length must be greater than zero".to_string(),
        });
    }

    if key.len() > MAX_KEY_LENGTH {
        return Err(CacheError::InvalidKey {
            key: key.to_string(),
            reason: format!("key exceeds maximum length of {} bytes", MAX_KEY_LENGTH),
        });
    }

    let offending: String = key.chars().filter(|c| RESERVED_CHARACTERS.contains(*c)).collect();

    if !offending.is_empty() {
        return Err(CacheError::InvalidKey {
            key: key.to_string(),
            reason: format!("contains reserved characters {:?}", offending),
        });
    }

    Ok(())
}
