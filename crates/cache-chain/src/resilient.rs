//! Resilient wrapper: timeout + circuit breaker + metrics around one backend

use crate::breaker::{BreakerConfig, CircuitBreaker};
use async_trait::async_trait;
use cache_chain_core::{CacheBackend, CacheError, CacheMetrics, CacheOperation, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Per-layer resilience configuration
///
/// The conventional arrangement gives fast local layers a short timeout
/// (tens of milliseconds) and remote layers a longer one (around a second).
#[derive(Debug, Clone)]
pub struct ResilientConfig {
    /// Deadline applied to every operation (zero = no timeout)
    pub operation_timeout: Duration,
    /// Circuit breaker parameters
    pub breaker: BreakerConfig,
}

impl Default for ResilientConfig {
    fn default() -> Self {
        Self {
            operation_timeout: Duration::from_secs(1),
            breaker: BreakerConfig::default(),
        }
    }
}

impl ResilientConfig {
    /// Set the per-operation timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Set the breaker configuration
    pub fn breaker(mut self, breaker: BreakerConfig) -> Self {
        self.breaker = breaker;
        self
    }
}

/// Wraps exactly one backend with timeout enforcement, a circuit breaker,
/// and operation metrics
///
/// The wrapper keeps the wrapped backend's name so metric and log labels stay
/// stable, and it implements the backend contract itself so a chain composes
/// wrapped layers uniformly. It changes failure modes and timing, never
/// semantics.
pub struct ResilientLayer {
    inner: Arc<dyn CacheBackend>,
    breaker: CircuitBreaker,
    operation_timeout: Duration,
    metrics: Arc<dyn CacheMetrics>,
}

impl ResilientLayer {
    /// Wrap a backend
    pub fn new(
        inner: Arc<dyn CacheBackend>,
        config: ResilientConfig,
        metrics: Arc<dyn CacheMetrics>,
    ) -> Self {
        let observer_metrics = metrics.clone();
        let breaker = CircuitBreaker::new(inner.name().to_string(), config.breaker)
            .with_observer(move |layer, state| observer_metrics.record_circuit_state(layer, state));
        Self {
            inner,
            breaker,
            operation_timeout: config.operation_timeout,
            metrics,
        }
    }

    /// The breaker guarding this layer
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Gate, time-limit, classify, and account one operation
    ///
    /// The future is built lazily by the caller, so the backend is only
    /// touched after the breaker admits the call. A deadline overrun is
    /// normalized to the timeout classification; misses report as successful
    /// probes so they never advance the breaker.
    async fn run<T>(
        &self,
        operation: CacheOperation,
        fut: impl Future<Output = Result<T>> + Send,
    ) -> (Duration, Result<T>) {
        let generation = match self.breaker.before_call() {
            Ok(generation) => generation,
            Err(error) => {
                self.metrics
                    .record_error(self.inner.name(), operation, error.kind());
                return (Duration::ZERO, Err(error));
            }
        };

        let start = Instant::now();
        let result = if self.operation_timeout.is_zero() {
            fut.await
        } else {
            match tokio::time::timeout(self.operation_timeout, fut).await {
                Ok(result) => result,
                Err(_) => Err(CacheError::Timeout),
            }
        };
        let elapsed = start.elapsed();

        let success = match &result {
            Ok(_) => true,
            Err(error) => !error.kind().is_circuit_failure(),
        };
        self.breaker.after_call(generation, success);

        if let Err(error) = &result {
            self.metrics
                .record_error(self.inner.name(), operation, error.kind());
        }
        (elapsed, result)
    }
}

#[async_trait]
impl CacheBackend for ResilientLayer {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let (elapsed, result) = self.run(CacheOperation::Get, self.inner.get(key)).await;
        match result {
            Ok(value) => {
                self.metrics
                    .record_get(self.inner.name(), value.is_some(), elapsed);
                Ok(value)
            }
            // Backends that signal absence as an error normalize to a miss
            Err(error) if error.is_not_found() => {
                self.metrics.record_get(self.inner.name(), false, elapsed);
                Ok(None)
            }
            Err(error) => Err(error),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let (elapsed, result) = self
            .run(CacheOperation::Set, self.inner.set(key, value, ttl))
            .await;
        self.metrics
            .record_set(self.inner.name(), result.is_ok(), elapsed);
        result
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let (elapsed, result) = self.run(CacheOperation::Delete, self.inner.delete(key)).await;
        self.metrics
            .record_delete(self.inner.name(), result.is_ok(), elapsed);
        result
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn close(&self) -> Result<()> {
        self.inner.close().await
    }

    fn writable(&self) -> bool {
        self.inner.writable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cache_chain_core::{CircuitState, ErrorKind, NoopMetrics};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct SlowBackend {
        delay: Duration,
    }

    #[async_trait]
    impl CacheBackend for SlowBackend {
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
            tokio::time::sleep(self.delay).await;
            Ok(Some(b"slow".to_vec()))
        }

        async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Option<Duration>) -> Result<()> {
            tokio::time::sleep(self.delay).await;
            Ok(())
        }

        async fn delete(&self, _key: &str) -> Result<bool> {
            Ok(false)
        }

        fn name(&self) -> &str {
            "slow"
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    struct FailingBackend {
        invocations: Arc<AtomicUsize>,
        error: CacheError,
    }

    #[async_trait]
    impl CacheBackend for FailingBackend {
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
            self.invocations.fetch_add(1, Ordering::SeqCst);
            Err(self.error.clone())
        }

        async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Option<Duration>) -> Result<()> {
            self.invocations.fetch_add(1, Ordering::SeqCst);
            Err(self.error.clone())
        }

        async fn delete(&self, _key: &str) -> Result<bool> {
            self.invocations.fetch_add(1, Ordering::SeqCst);
            Err(self.error.clone())
        }

        fn name(&self) -> &str {
            "failing"
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    struct MissBackend;

    #[async_trait]
    impl CacheBackend for MissBackend {
        async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
            Err(CacheError::NotFound(key.to_string()))
        }

        async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Option<Duration>) -> Result<()> {
            Ok(())
        }

        async fn delete(&self, _key: &str) -> Result<bool> {
            Ok(false)
        }

        fn name(&self) -> &str {
            "miss"
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingMetrics {
        events: Mutex<Vec<String>>,
    }

    impl CacheMetrics for RecordingMetrics {
        fn record_get(&self, layer: &str, hit: bool, _duration: Duration) {
            self.events.lock().push(format!("get:{layer}:{hit}"));
        }

        fn record_set(&self, layer: &str, success: bool, _duration: Duration) {
            self.events.lock().push(format!("set:{layer}:{success}"));
        }

        fn record_delete(&self, layer: &str, success: bool, _duration: Duration) {
            self.events.lock().push(format!("delete:{layer}:{success}"));
        }

        fn record_error(&self, layer: &str, operation: CacheOperation, kind: ErrorKind) {
            self.events
                .lock()
                .push(format!("error:{layer}:{}:{}", operation.as_str(), kind.as_str()));
        }

        fn record_circuit_state(&self, layer: &str, state: CircuitState) {
            self.events
                .lock()
                .push(format!("circuit:{layer}:{}", state.as_str()));
        }

        fn record_queue_depth(&self, _layer: &str, _depth: usize) {}

        fn record_write_dropped(&self, _layer: &str) {}

        fn record_async_write(&self, _layer: &str, _success: bool, _duration: Duration) {}

        fn record_chain_get(&self, _hit: bool, _hit_layer: Option<usize>, _duration: Duration) {}
    }

    fn trip_after(failures: u32) -> BreakerConfig {
        BreakerConfig::default().ready_to_trip(move |counts| counts.consecutive_failures >= failures)
    }

    #[tokio::test]
    async fn test_timeout_normalization() {
        let backend = Arc::new(SlowBackend {
            delay: Duration::from_millis(200),
        });
        let layer = ResilientLayer::new(
            backend,
            ResilientConfig::default().timeout(Duration::from_millis(10)),
            Arc::new(NoopMetrics),
        );

        let err = layer.get("key").await.unwrap_err();
        assert_eq!(err.kind().as_str(), "timeout");
    }

    #[tokio::test]
    async fn test_zero_timeout_disables_deadline() {
        let backend = Arc::new(SlowBackend {
            delay: Duration::from_millis(20),
        });
        let layer = ResilientLayer::new(
            backend,
            ResilientConfig::default().timeout(Duration::ZERO),
            Arc::new(NoopMetrics),
        );

        assert_eq!(layer.get("key").await.unwrap(), Some(b"slow".to_vec()));
    }

    #[tokio::test]
    async fn test_failures_trip_and_short_circuit() {
        let invocations = Arc::new(AtomicUsize::new(0));
        let backend = Arc::new(FailingBackend {
            invocations: invocations.clone(),
            error: CacheError::Unavailable("down".to_string()),
        });
        let layer = ResilientLayer::new(
            backend,
            ResilientConfig::default().breaker(trip_after(2)),
            Arc::new(NoopMetrics),
        );

        assert!(layer.get("key").await.is_err());
        assert!(layer.get("key").await.is_err());
        assert_eq!(layer.breaker().state(), CircuitState::Open);

        // Short-circuited: the backend is not invoked again
        let err = layer.get("key").await.unwrap_err();
        assert_eq!(err.kind().as_str(), "circuit_breaker_open");
        assert_eq!(invocations.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_misses_never_advance_the_breaker() {
        let layer = ResilientLayer::new(
            Arc::new(MissBackend),
            ResilientConfig::default().breaker(trip_after(2)),
            Arc::new(NoopMetrics),
        );

        for _ in 0..100 {
            // NotFound from the backend normalizes to a plain miss
            assert_eq!(layer.get("key").await.unwrap(), None);
        }
        assert_eq!(layer.breaker().state(), CircuitState::Closed);
        assert_eq!(layer.breaker().counts().total_failures, 0);
    }

    #[tokio::test]
    async fn test_metrics_and_label_identity() {
        let metrics = Arc::new(RecordingMetrics::default());
        let invocations = Arc::new(AtomicUsize::new(0));
        let backend = Arc::new(FailingBackend {
            invocations,
            error: CacheError::Backend("boom".to_string()),
        });
        let layer = ResilientLayer::new(
            backend,
            ResilientConfig::default().breaker(trip_after(1)),
            metrics.clone(),
        );

        // Wrapper name equals the wrapped backend's name
        assert_eq!(layer.name(), "failing");

        let _ = layer.get("key").await;
        let events = metrics.events.lock().clone();
        assert!(events.contains(&"error:failing:get:backend".to_string()));
        assert!(events.contains(&"circuit:failing:open".to_string()));
    }

    #[tokio::test]
    async fn test_set_failure_recorded() {
        let metrics = Arc::new(RecordingMetrics::default());
        let backend = Arc::new(FailingBackend {
            invocations: Arc::new(AtomicUsize::new(0)),
            error: CacheError::Connection("refused".to_string()),
        });
        let layer = ResilientLayer::new(backend, ResilientConfig::default(), metrics.clone());

        assert!(layer.set("key", b"v".to_vec(), None).await.is_err());
        let events = metrics.events.lock().clone();
        assert!(events.contains(&"set:failing:false".to_string()));
        assert!(events.contains(&"error:failing:set:connection".to_string()));
    }
}
