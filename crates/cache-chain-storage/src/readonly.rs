//! Read-only source-of-truth adapter

use async_trait::async_trait;
use cache_chain_core::{CacheBackend, CacheError, Result};
use std::time::Duration;

/// Marks a backend as an authoritative, read-only terminal layer
///
/// Reads pass through; `set` and `delete` answer `Unsupported` instead of
/// silently succeeding, and `writable()` reports `false` so a chain can skip
/// write fan-out to this layer by design rather than by accident.
pub struct ReadOnlySource<B> {
    inner: B,
}

impl<B> ReadOnlySource<B> {
    /// Wrap a backend as read-only
    pub fn new(inner: B) -> Self {
        Self { inner }
    }

    /// Access the wrapped backend
    pub fn inner(&self) -> &B {
        &self.inner
    }
}

#[async_trait]
impl<B: CacheBackend> CacheBackend for ReadOnlySource<B> {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.inner.get(key).await
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Option<Duration>) -> Result<()> {
        Err(CacheError::Unsupported(self.inner.name().to_string()))
    }

    async fn delete(&self, _key: &str) -> Result<bool> {
        Err(CacheError::Unsupported(self.inner.name().to_string()))
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn close(&self) -> Result<()> {
        self.inner.close().await
    }

    fn writable(&self) -> bool {
        false
    }

    async fn get_multi(&self, keys: &[&str]) -> Result<Vec<Option<Vec<u8>>>> {
        self.inner.get_multi(keys).await
    }

    async fn set_multi(&self, _entries: &[(&str, Vec<u8>)], _ttl: Option<Duration>) -> Result<()> {
        Err(CacheError::Unsupported(self.inner.name().to_string()))
    }

    async fn delete_multi(&self, _keys: &[&str]) -> Result<u64> {
        Err(CacheError::Unsupported(self.inner.name().to_string()))
    }
}
