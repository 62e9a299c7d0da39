//! cache-chain: Pluggable N-layer read-through/write-through caching
//!
//! # Features
//!
//! - **Ordered layer chains** (fast in-process layers in front of slow
//!   remote ones) with fall-through reads and fan-out writes
//! - **Asynchronous warm-up** of faster layers off the hot read path
//! - **Per-layer resilience**: timeout, circuit breaker, error classification
//! - **Single-flight** de-duplication of concurrent reads
//! - **Pluggable TTL strategies** and metrics sinks
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use cache_chain::prelude::*;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//!     let chain = CacheChain::builder()
//!         .layer(MemoryBackend::new(MemoryConfig::named("l0")))
//!         .layer(MemoryBackend::new(MemoryConfig::named("l1")))
//!         .ttl_strategy(TtlStrategy::decaying(0.5))
//!         .warm_ttl(Duration::from_secs(300))
//!         .build()?;
//!
//!     chain.set("user:1", b"Alice".to_vec(), Some(Duration::from_secs(3600))).await?;
//!     if let Some(value) = chain.get("user:1").await? {
//!         println!("Got: {}", String::from_utf8_lossy(&value));
//!     }
//!
//!     chain.close().await?;
//!     Ok(())
//! }
//! ```

mod breaker;
mod chain;
mod resilient;
mod writer;

// Re-export core
pub use cache_chain_core::*;

// Re-export storage
#[cfg(feature = "memory")]
pub use cache_chain_storage::{MemoryBackend, MemoryConfig};

#[cfg(feature = "redis")]
pub use cache_chain_storage::{RedisBackend, RedisConfig};

pub use cache_chain_storage::ReadOnlySource;

// Export chain components
pub use breaker::{BreakerConfig, CircuitBreaker, Counts, TripPredicate, default_trip};
pub use chain::{CacheChain, ChainBuilder, ChainConfig};
pub use resilient::{ResilientConfig, ResilientLayer};
pub use writer::{AsyncWriter, WriterConfig, WriterStats};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        BreakerConfig, CacheBackend, CacheChain, CacheError, CacheMetrics, ChainBuilder,
        ChainConfig, CircuitState, ErrorKind, NoopMetrics, ReadOnlySource, ResilientConfig,
        Result, TtlStrategy, WriterConfig,
    };

    #[cfg(feature = "memory")]
    pub use crate::{MemoryBackend, MemoryConfig};

    #[cfg(feature = "redis")]
    pub use crate::{RedisBackend, RedisConfig};

    #[cfg(feature = "metrics")]
    pub use crate::MetricsRecorder;

    #[cfg(feature = "tracing-metrics")]
    pub use crate::TracingMetrics;
}
