//! Cache backend contract

use crate::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Core trait implemented by every cache layer
///
/// Implementations include the in-memory backend, the Redis backend, the
/// resilient wrapper around either, and the chain itself, so layers compose
/// uniformly.
///
/// TTL semantics: `None` or `Some(Duration::ZERO)` means "use the backend
/// default"; backends may cap the effective TTL per layer.
#[async_trait]
pub trait CacheBackend: Send + Sync + 'static {
    /// Get a value
    ///
    /// Returns `Ok(None)` when the key is absent or expired. Absence is not a
    /// failure and must never be reported as an error.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Set a value with an optional TTL
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()>;

    /// Delete a key
    ///
    /// Returns `true` if the key existed. Deleting a missing key is not an
    /// error.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Stable identifier used as a metric/log label
    fn name(&self) -> &str;

    /// Release backend resources; must be idempotent
    async fn close(&self) -> Result<()>;

    /// Whether this backend accepts `set`/`delete`
    ///
    /// Read-only sources of truth report `false`; the chain then treats
    /// writes to them as success-by-design instead of calling through.
    fn writable(&self) -> bool {
        true
    }

    /// Get multiple keys; results are in input order
    async fn get_multi(&self, keys: &[&str]) -> Result<Vec<Option<Vec<u8>>>> {
        let mut results = Vec::with_capacity(keys.len());
        for key in keys {
            results.push(self.get(key).await?);
        }
        Ok(results)
    }

    /// Set multiple entries with a shared TTL
    async fn set_multi(&self, entries: &[(&str, Vec<u8>)], ttl: Option<Duration>) -> Result<()> {
        for (key, value) in entries {
            self.set(key, value.clone(), ttl).await?;
        }
        Ok(())
    }

    /// Delete multiple keys; returns how many existed
    async fn delete_multi(&self, keys: &[&str]) -> Result<u64> {
        let mut deleted = 0;
        for key in keys {
            if self.delete(key).await? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}

/// Extension trait for backends that can drop all entries at once
///
/// Kept separate from [`CacheBackend`] so the capability is explicit rather
/// than feature-detected by downcasting.
#[async_trait]
pub trait ClearableBackend: CacheBackend {
    /// Remove every entry from the backend
    async fn clear(&self) -> Result<()>;
}

#[async_trait]
impl<B: CacheBackend + ?Sized> CacheBackend for std::sync::Arc<B> {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        (**self).set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        (**self).delete(key).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    async fn close(&self) -> Result<()> {
        (**self).close().await
    }

    fn writable(&self) -> bool {
        (**self).writable()
    }

    async fn get_multi(&self, keys: &[&str]) -> Result<Vec<Option<Vec<u8>>>> {
        (**self).get_multi(keys).await
    }

    async fn set_multi(&self, entries: &[(&str, Vec<u8>)], ttl: Option<Duration>) -> Result<()> {
        (**self).set_multi(entries, ttl).await
    }

    async fn delete_multi(&self, keys: &[&str]) -> Result<u64> {
        (**self).delete_multi(keys).await
    }
}
