//! Chain orchestrator: fall-through reads, fan-out writes, warm-up dispatch

use crate::resilient::{ResilientConfig, ResilientLayer};
use crate::writer::{AsyncWriter, WriterConfig};
use async_trait::async_trait;
use cache_chain_core::{
    CacheBackend, CacheError, CacheMetrics, NoopMetrics, Result, TtlStrategy,
};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

mod coalescer;
use coalescer::Coalescer;

/// Chain-wide configuration
#[derive(Debug, Clone)]
pub struct ChainConfig {
    /// Identifier reported when the chain is itself used as a backend
    pub name: String,
    /// Per-layer TTL policy applied on set and warm-up
    pub ttl_strategy: TtlStrategy,
    /// Base TTL for warm-up writes (None = backend defaults)
    pub warm_ttl: Option<Duration>,
    /// Fractional TTL jitter in `[0, 1)` to de-synchronize expiry
    pub ttl_jitter: f64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            name: "cache-chain".to_string(),
            ttl_strategy: TtlStrategy::Uniform,
            warm_ttl: None,
            ttl_jitter: 0.0,
        }
    }
}

struct LayerSpec {
    backend: Arc<dyn CacheBackend>,
    resilient: ResilientConfig,
    writer: WriterConfig,
}

/// Builder for [`CacheChain`]
///
/// Layers are added fastest first; the last layer added is the terminal,
/// slowest one. At least one layer is required.
pub struct ChainBuilder {
    config: ChainConfig,
    metrics: Arc<dyn CacheMetrics>,
    layers: Vec<LayerSpec>,
}

impl Default for ChainBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ChainBuilder {
    /// Start an empty builder with no-op metrics
    pub fn new() -> Self {
        Self {
            config: ChainConfig::default(),
            metrics: Arc::new(NoopMetrics),
            layers: Vec::new(),
        }
    }

    /// Append a layer with default resilience and writer settings
    pub fn layer(self, backend: impl CacheBackend) -> Self {
        self.layer_with(backend, ResilientConfig::default(), WriterConfig::default())
    }

    /// Append a layer with explicit resilience and writer settings
    pub fn layer_with(
        mut self,
        backend: impl CacheBackend,
        resilient: ResilientConfig,
        writer: WriterConfig,
    ) -> Self {
        self.layers.push(LayerSpec {
            backend: Arc::new(backend),
            resilient,
            writer,
        });
        self
    }

    /// Replace the whole configuration bundle
    pub fn config(mut self, config: ChainConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the metrics sink
    pub fn metrics(mut self, metrics: impl CacheMetrics) -> Self {
        self.metrics = Arc::new(metrics);
        self
    }

    /// Set the TTL strategy
    pub fn ttl_strategy(mut self, strategy: TtlStrategy) -> Self {
        self.config.ttl_strategy = strategy;
        self
    }

    /// Set the base TTL used when warming faster layers
    pub fn warm_ttl(mut self, ttl: Duration) -> Self {
        self.config.warm_ttl = Some(ttl);
        self
    }

    /// Set the fractional TTL jitter
    pub fn ttl_jitter(mut self, jitter: f64) -> Self {
        self.config.ttl_jitter = jitter;
        self
    }

    /// Set the chain's own backend name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Validate the configuration and assemble the chain
    ///
    /// Must be called from within a Tokio runtime: each layer's warm-up
    /// writer spawns its worker tasks here.
    pub fn build(self) -> Result<CacheChain> {
        if self.layers.is_empty() {
            return Err(CacheError::Configuration(
                "chain requires at least one layer".to_string(),
            ));
        }
        self.config.ttl_strategy.validate()?;
        if !(0.0..1.0).contains(&self.config.ttl_jitter) {
            return Err(CacheError::Configuration(format!(
                "ttl_jitter must be in [0, 1), got {}",
                self.config.ttl_jitter
            )));
        }
        for layer_spec in &self.layers {
            layer_spec.writer.validate()?;
        }

        let mut layers = Vec::with_capacity(self.layers.len());
        let mut writers = Vec::with_capacity(self.layers.len());
        for layer_spec in self.layers {
            let layer = Arc::new(ResilientLayer::new(
                layer_spec.backend,
                layer_spec.resilient,
                self.metrics.clone(),
            ));
            let warm_target: Arc<dyn CacheBackend> = layer.clone();
            let writer = Arc::new(AsyncWriter::new(
                warm_target,
                layer_spec.writer,
                self.metrics.clone(),
            ));
            layers.push(layer);
            writers.push(writer);
        }

        Ok(CacheChain {
            layers,
            writers,
            config: self.config,
            metrics: self.metrics,
            coalescer: Coalescer::new(),
            closed: AtomicBool::new(false),
        })
    }
}

/// Ordered composition of resilient layers with fall-through reads and
/// fan-out writes
///
/// Layer 0 is the fastest layer; the terminal layer is the slowest (or an
/// authoritative read-only source). A hit at a deeper layer warms every
/// faster layer through that layer's own async writer. Client writes never
/// pass through the writers.
pub struct CacheChain {
    layers: Vec<Arc<ResilientLayer>>,
    writers: Vec<Arc<AsyncWriter>>,
    config: ChainConfig,
    metrics: Arc<dyn CacheMetrics>,
    coalescer: Coalescer,
    closed: AtomicBool,
}

impl fmt::Debug for CacheChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheChain")
            .field("layers", &self.layers.len())
            .field("writers", &self.writers.len())
            .field("config", &self.config)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

/// Apply fractional jitter on top of a computed TTL
fn jittered(ttl: Option<Duration>, jitter: f64) -> Option<Duration> {
    if jitter <= 0.0 {
        return ttl;
    }
    ttl.map(|ttl| {
        if ttl.is_zero() {
            return ttl;
        }
        let spread = ttl.as_secs_f64() * jitter * rand::random::<f64>();
        ttl + Duration::from_secs_f64(spread)
    })
}

impl CacheChain {
    /// Start building a chain
    pub fn builder() -> ChainBuilder {
        ChainBuilder::new()
    }

    /// Get a value, falling through the layers in order
    ///
    /// Concurrent gets for the same key coalesce into one execution. A layer
    /// error is skipped, never bubbled while a deeper layer can still
    /// answer; a hit at layer `i` enqueues warm-ups for layers `0..i` before
    /// returning. `Ok(None)` means no layer holds the key.
    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let layers = self.layers.clone();
        let writers = self.writers.clone();
        let strategy = self.config.ttl_strategy.clone();
        let warm_ttl = self.config.warm_ttl;
        let ttl_jitter = self.config.ttl_jitter;
        let metrics = self.metrics.clone();
        let key_owned = key.to_string();

        self.coalescer
            .execute(key, move || {
                Self::fall_through(layers, writers, strategy, warm_ttl, ttl_jitter, metrics, key_owned)
            })
            .await
    }

    async fn fall_through(
        layers: Vec<Arc<ResilientLayer>>,
        writers: Vec<Arc<AsyncWriter>>,
        strategy: TtlStrategy,
        warm_ttl: Option<Duration>,
        ttl_jitter: f64,
        metrics: Arc<dyn CacheMetrics>,
        key: String,
    ) -> Result<Option<Vec<u8>>> {
        let start = Instant::now();
        let total = layers.len();
        let mut last_err: Option<CacheError> = None;

        for (index, layer) in layers.iter().enumerate() {
            match layer.get(&key).await {
                Ok(Some(value)) => {
                    // Warm every faster writable layer; the enqueue is bounded
                    // and the writes run on the writers' workers.
                    for warm_index in (0..index).rev() {
                        if !layers[warm_index].writable() {
                            continue;
                        }
                        let ttl = jittered(strategy.ttl_for(warm_index, total, warm_ttl), ttl_jitter);
                        if let Err(error) = writers[warm_index].write(&key, value.clone(), ttl).await
                        {
                            tracing::debug!(
                                target: "cache_chain",
                                layer = layers[warm_index].name(),
                                key = %key,
                                %error,
                                "warm-up enqueue dropped"
                            );
                        }
                    }
                    metrics.record_chain_get(true, Some(index), start.elapsed());
                    return Ok(Some(value));
                }
                Ok(None) => {
                    // A deeper layer is authoritative for this key's absence
                    last_err = None;
                }
                Err(error) => {
                    tracing::debug!(
                        target: "cache_chain",
                        layer = layer.name(),
                        key = %key,
                        %error,
                        "layer error during read, falling through"
                    );
                    last_err = Some(error);
                }
            }
        }

        metrics.record_chain_get(false, None, start.elapsed());
        match last_err {
            Some(error) => Err(error),
            None => Ok(None),
        }
    }

    /// Set a value on every layer, fastest first
    ///
    /// The TTL strategy computes each layer's effective TTL from `ttl`.
    /// Every writable layer is attempted even after a failure; the most
    /// recent failure is returned, with each one logged per layer.
    pub async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let total = self.layers.len();
        let mut last_err = None;

        for (index, layer) in self.layers.iter().enumerate() {
            if !layer.writable() {
                // Read-only source of truth; success by design
                continue;
            }
            let layer_ttl = jittered(
                self.config.ttl_strategy.ttl_for(index, total, ttl),
                self.config.ttl_jitter,
            );
            if let Err(error) = layer.set(key, value.clone(), layer_ttl).await {
                tracing::warn!(
                    target: "cache_chain",
                    layer = layer.name(),
                    key = %key,
                    %error,
                    "set failed on layer"
                );
                last_err = Some(error);
            }
        }

        match last_err {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Delete a key from every layer, fastest first
    ///
    /// Returns `true` if any layer held the key. A warm-up enqueued by a get
    /// that raced this delete may transiently restore the value into a fast
    /// layer until its TTL or eviction resolves it.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        let mut deleted_any = false;
        let mut last_err = None;

        for layer in &self.layers {
            if !layer.writable() {
                continue;
            }
            match layer.delete(key).await {
                Ok(deleted) => deleted_any |= deleted,
                Err(error) => {
                    tracing::warn!(
                        target: "cache_chain",
                        layer = layer.name(),
                        key = %key,
                        %error,
                        "delete failed on layer"
                    );
                    last_err = Some(error);
                }
            }
        }

        match last_err {
            Some(error) => Err(error),
            None => Ok(deleted_any),
        }
    }

    /// Close the writers (draining queued warm-ups) and then the layers
    ///
    /// Idempotent; subsequent calls return `Ok` immediately.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        for writer in &self.writers {
            writer.close().await;
        }
        let mut last_err = None;
        for layer in &self.layers {
            if let Err(error) = layer.close().await {
                last_err = Some(error);
            }
        }
        match last_err {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Wait until every layer's warm-up queue has drained
    pub async fn flush(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        for writer in &self.writers {
            let remaining = deadline.saturating_duration_since(Instant::now());
            writer.flush(remaining).await?;
        }
        Ok(())
    }

    /// Layer identifiers, fastest first
    pub fn layers(&self) -> Vec<&str> {
        self.layers.iter().map(|layer| layer.name()).collect()
    }

    /// Number of layers
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// A chain always has at least one layer
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

#[async_trait]
impl CacheBackend for CacheChain {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        CacheChain::get(self, key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        CacheChain::set(self, key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        CacheChain::delete(self, key).await
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    async fn close(&self) -> Result<()> {
        CacheChain::close(self).await
    }
}
