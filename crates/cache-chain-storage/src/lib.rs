//! cache-chain-storage: Storage backends for cache-chain

#[cfg(feature = "memory")]
pub mod memory;

#[cfg(feature = "memory")]
pub use memory::{MemoryBackend, MemoryConfig};

#[cfg(feature = "redis")]
pub mod redis;

#[cfg(feature = "redis")]
pub use redis::{RedisBackend, RedisConfig};

mod readonly;

pub use readonly::ReadOnlySource;
