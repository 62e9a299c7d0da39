//! Key validation rules shared by backends

use crate::{CacheError, Result};

/// Maximum accepted key length in characters
pub const MAX_KEY_LENGTH: usize = 250;

/// Validate a cache key
///
/// Keys must be non-empty, at most [`MAX_KEY_LENGTH`] characters, contain no
/// control characters, and carry no leading or trailing whitespace. Backends
/// call this at their boundary; the chain itself passes keys through
/// untouched.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CacheError::InvalidKey("key is empty".to_string()));
    }
    if key.chars().count() > MAX_KEY_LENGTH {
        return Err(CacheError::InvalidKey(format!(
            "key exceeds {MAX_KEY_LENGTH} characters"
        )));
    }
    if key.chars().any(char::is_control) {
        return Err(CacheError::InvalidKey(
            "key contains control characters".to_string(),
        ));
    }
    if key.trim() != key {
        return Err(CacheError::InvalidKey(
            "key has leading or trailing whitespace".to_string(),
        ));
    }
    Ok(())
}
