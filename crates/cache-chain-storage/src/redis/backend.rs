use async_trait::async_trait;
use bb8::{Pool, PooledConnection};
use bb8_redis::RedisConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;

use cache_chain_core::{CacheBackend, CacheError, ErrorKind, Result, classify_message, validate_key};

use super::config::RedisConfig;

/// Redis backend implementation
///
/// Values are stored as raw byte strings; callers own serialization. All keys
/// are namespaced under the configured prefix.
#[derive(Clone)]
pub struct RedisBackend {
    pool: Pool<RedisConnectionManager>,
    config: RedisConfig,
}

impl RedisBackend {
    /// Create a new Redis backend
    pub async fn new(config: RedisConfig) -> Result<Self> {
        let manager = RedisConnectionManager::new(config.url.as_str())
            .map_err(|e| CacheError::Connection(e.to_string()))?;

        let pool = Pool::builder()
            .max_size(config.pool_size)
            .connection_timeout(config.connection_timeout)
            .build(manager)
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))?;

        Ok(Self { pool, config })
    }

    fn prefixed_key(&self, key: &str) -> String {
        self.config.prefixed_key(key)
    }

    /// Get connection from pool
    async fn get_connection(&self) -> Result<PooledConnection<'_, RedisConnectionManager>> {
        self.pool
            .get()
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))
    }

    /// Classify a driver error: typed sentinels first, message hints second
    fn map_err(e: redis::RedisError) -> CacheError {
        if e.is_timeout() {
            return CacheError::Timeout;
        }
        if e.is_connection_refusal() || e.is_connection_dropped() || e.is_io_error() {
            return CacheError::Connection(e.to_string());
        }
        let msg = e.to_string();
        match classify_message(&msg) {
            ErrorKind::Timeout => CacheError::Timeout,
            ErrorKind::Connection => CacheError::Connection(msg),
            ErrorKind::Serialization => CacheError::Serialization(msg),
            ErrorKind::Unavailable => CacheError::Unavailable(msg),
            _ => CacheError::Backend(msg),
        }
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        validate_key(key)?;
        let mut conn = self.get_connection().await?;
        let prefixed = self.prefixed_key(key);

        let bytes: Option<Vec<u8>> = conn.get(&prefixed).await.map_err(Self::map_err)?;
        Ok(bytes)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        validate_key(key)?;
        let mut conn = self.get_connection().await?;
        let prefixed = self.prefixed_key(key);

        match self.config.effective_ttl(ttl) {
            Some(ttl) => {
                // EX takes whole seconds and rejects zero
                let secs = ttl.as_secs().max(1);
                conn.set_ex::<_, _, ()>(&prefixed, value, secs)
                    .await
                    .map_err(Self::map_err)?;
            }
            None => {
                conn.set::<_, _, ()>(&prefixed, value)
                    .await
                    .map_err(Self::map_err)?;
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        let mut conn = self.get_connection().await?;
        let prefixed = self.prefixed_key(key);

        let deleted: bool = conn.del(&prefixed).await.map_err(Self::map_err)?;
        Ok(deleted)
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    async fn close(&self) -> Result<()> {
        // Pooled connections are released when the pool drops
        Ok(())
    }

    async fn get_multi(&self, keys: &[&str]) -> Result<Vec<Option<Vec<u8>>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        for key in keys {
            validate_key(key)?;
        }
        let mut conn = self.get_connection().await?;
        let prefixed: Vec<String> = keys.iter().map(|k| self.prefixed_key(k)).collect();

        // MGET collapses a single key to a scalar reply; use a plain GET there
        if prefixed.len() == 1 {
            let value: Option<Vec<u8>> = conn.get(&prefixed[0]).await.map_err(Self::map_err)?;
            return Ok(vec![value]);
        }
        let values: Vec<Option<Vec<u8>>> = conn.mget(&prefixed).await.map_err(Self::map_err)?;
        Ok(values)
    }

    async fn delete_multi(&self, keys: &[&str]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        for key in keys {
            validate_key(key)?;
        }
        let mut conn = self.get_connection().await?;
        let prefixed: Vec<String> = keys.iter().map(|k| self.prefixed_key(k)).collect();

        let deleted: u64 = conn.del(&prefixed).await.map_err(Self::map_err)?;
        Ok(deleted)
    }
}
