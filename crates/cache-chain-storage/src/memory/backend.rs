//! In-memory cache backend using DashMap

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

use cache_chain_core::{CacheBackend, ClearableBackend, Result, validate_key};

/// Configuration for the memory backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Stable layer identifier used in metrics and logs
    pub name: String,
    /// Maximum number of entries (0 = unlimited)
    pub max_capacity: usize,
    /// TTL applied to entries stored without one (None = no expiry)
    pub default_ttl: Option<Duration>,
    /// Cap on the effective TTL of any entry (None = uncapped)
    pub max_ttl: Option<Duration>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            name: "memory".to_string(),
            max_capacity: 10_000,
            default_ttl: None,
            max_ttl: None,
        }
    }
}

impl MemoryConfig {
    /// Create config with a specific layer name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the entry capacity
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.max_capacity = capacity;
        self
    }

    /// Set the default TTL
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    /// Cap the effective TTL
    pub fn with_max_ttl(mut self, ttl: Duration) -> Self {
        self.max_ttl = Some(ttl);
        self
    }
}

#[derive(Debug, Clone)]
struct StoredEntry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl StoredEntry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// In-memory cache backend
///
/// Uses `DashMap` for concurrent access; expiry is checked on read. Cloning
/// creates a new handle to the SAME underlying store.
#[derive(Clone)]
pub struct MemoryBackend {
    data: Arc<DashMap<String, StoredEntry>>,
    config: MemoryConfig,
}

impl MemoryBackend {
    /// Create a new memory backend
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            data: Arc::new(DashMap::with_capacity(config.max_capacity.min(10_000))),
            config,
        }
    }

    /// Create with default configuration
    pub fn with_defaults() -> Self {
        Self::new(MemoryConfig::default())
    }

    /// Resolve the TTL actually applied to an entry
    ///
    /// `None` and zero both mean "use the backend default"; the result is
    /// clamped to `max_ttl` when one is configured.
    fn effective_ttl(&self, ttl: Option<Duration>) -> Option<Duration> {
        let ttl = match ttl {
            Some(t) if !t.is_zero() => Some(t),
            _ => self.config.default_ttl,
        };
        match (ttl, self.config.max_ttl) {
            (Some(t), Some(cap)) => Some(t.min(cap)),
            (t, _) => t,
        }
    }

    /// Evict entries if at capacity
    fn maybe_evict(&self) {
        if self.config.max_capacity == 0 {
            return; // Unlimited
        }
        if self.data.len() < self.config.max_capacity {
            return;
        }

        // Drop expired entries first; fall back to arbitrary eviction
        let mut expired: Vec<String> = Vec::new();
        for entry in self.data.iter() {
            if entry.value().is_expired() {
                expired.push(entry.key().clone());
            }
        }
        for key in &expired {
            self.data.remove(key);
        }
        if self.data.len() < self.config.max_capacity {
            return;
        }

        let overflow = self.data.len() + 1 - self.config.max_capacity;
        let victims: Vec<String> = self
            .data
            .iter()
            .take(overflow)
            .map(|entry| entry.key().clone())
            .collect();
        for key in victims {
            self.data.remove(&key);
        }
    }

    /// Remove every expired entry; returns how many were dropped
    pub fn cleanup_expired(&self) -> usize {
        let expired: Vec<String> = self
            .data
            .iter()
            .filter(|entry| entry.value().is_expired())
            .map(|entry| entry.key().clone())
            .collect();
        let count = expired.len();
        for key in expired {
            self.data.remove(&key);
        }
        count
    }

    /// Number of live entries (expired-but-unswept entries included)
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the store holds no entries
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        validate_key(key)?;
        match self.data.get(key) {
            Some(entry) => {
                if entry.is_expired() {
                    drop(entry);
                    self.data.remove(key);
                    return Ok(None);
                }
                Ok(Some(entry.value.clone()))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        validate_key(key)?;
        self.maybe_evict();

        let expires_at = self.effective_ttl(ttl).map(|t| Instant::now() + t);
        self.data.insert(key.to_string(), StoredEntry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        Ok(self.data.remove(key).is_some())
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl ClearableBackend for MemoryBackend {
    async fn clear(&self) -> Result<()> {
        self.data.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let backend = MemoryBackend::with_defaults();

        backend.set("key", b"val".to_vec(), None).await.unwrap();
        assert_eq!(backend.get("key").await.unwrap(), Some(b"val".to_vec()));

        assert!(backend.delete("key").await.unwrap());
        assert!(!backend.delete("key").await.unwrap());
        assert_eq!(backend.get("key").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expiry() {
        let backend = MemoryBackend::with_defaults();

        backend
            .set("key", b"val".to_vec(), Some(Duration::from_millis(10)))
            .await
            .unwrap();
        assert!(backend.get("key").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(25)).await;
        assert_eq!(backend.get("key").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_zero_ttl_means_default() {
        let config = MemoryConfig::named("l0").with_default_ttl(Duration::from_millis(10));
        let backend = MemoryBackend::new(config);

        backend
            .set("key", b"val".to_vec(), Some(Duration::ZERO))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(25)).await;
        assert_eq!(backend.get("key").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_max_ttl_cap() {
        let config = MemoryConfig::named("l0").with_max_ttl(Duration::from_millis(10));
        let backend = MemoryBackend::new(config);

        backend
            .set("key", b"val".to_vec(), Some(Duration::from_secs(3600)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(25)).await;
        assert_eq!(backend.get("key").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_capacity_eviction() {
        let config = MemoryConfig::named("tiny").with_capacity(3);
        let backend = MemoryBackend::new(config);

        for i in 0..5 {
            backend
                .set(&format!("key{i}"), vec![i as u8], None)
                .await
                .unwrap();
        }
        assert!(backend.len() <= 3);
    }

    #[tokio::test]
    async fn test_invalid_key_rejected() {
        let backend = MemoryBackend::with_defaults();
        let err = backend.get("").await.unwrap_err();
        assert_eq!(err.kind().as_str(), "invalid_key");
        let err = backend.set(" padded ", vec![], None).await.unwrap_err();
        assert_eq!(err.kind().as_str(), "invalid_key");
    }

    #[tokio::test]
    async fn test_clear() {
        let backend = MemoryBackend::with_defaults();
        backend.set("a", vec![1], None).await.unwrap();
        backend.set("b", vec![2], None).await.unwrap();
        backend.clear().await.unwrap();
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn test_clone_shares_store() {
        let backend = MemoryBackend::with_defaults();
        let handle = backend.clone();
        backend.set("key", b"val".to_vec(), None).await.unwrap();
        assert_eq!(handle.get("key").await.unwrap(), Some(b"val".to_vec()));
    }
}
