//! Metrics sink for chain observability

use crate::ErrorKind;
use std::time::Duration;

/// Chain operation for metric labeling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheOperation {
    Get,
    Set,
    Delete,
}

impl CacheOperation {
    /// Get operation as string label
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheOperation::Get => "get",
            CacheOperation::Set => "set",
            CacheOperation::Delete => "delete",
        }
    }
}

/// Circuit breaker state, exposed here so sinks can label transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CircuitState {
    /// Calls flow through; failures accumulate
    Closed = 0,
    /// Calls are rejected without reaching the backend
    Open = 1,
    /// A bounded number of probe calls are allowed
    HalfOpen = 2,
}

impl CircuitState {
    /// Get state as string label
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

/// Trait for chain metrics/observability
///
/// Implement this to integrate with your metrics system. Every event carries
/// the stable layer name as its first label.
pub trait CacheMetrics: Send + Sync + 'static {
    /// Record a per-layer get and whether it hit
    fn record_get(&self, layer: &str, hit: bool, duration: Duration);

    /// Record a per-layer set outcome
    fn record_set(&self, layer: &str, success: bool, duration: Duration);

    /// Record a per-layer delete outcome
    fn record_delete(&self, layer: &str, success: bool, duration: Duration);

    /// Record a classified per-layer error
    fn record_error(&self, layer: &str, operation: CacheOperation, kind: ErrorKind);

    /// Record a circuit breaker state transition (once per edge)
    fn record_circuit_state(&self, layer: &str, state: CircuitState);

    /// Record the current warm-up queue depth for a layer
    fn record_queue_depth(&self, layer: &str, depth: usize);

    /// Record a warm-up write dropped by queue backpressure
    fn record_write_dropped(&self, layer: &str);

    /// Record a completed background warm-up write
    fn record_async_write(&self, layer: &str, success: bool, duration: Duration);

    /// Record a whole-chain get: hit flag, hit layer index, total duration
    fn record_chain_get(&self, hit: bool, hit_layer: Option<usize>, duration: Duration);
}

impl<M: CacheMetrics + ?Sized> CacheMetrics for std::sync::Arc<M> {
    fn record_get(&self, layer: &str, hit: bool, duration: Duration) {
        (**self).record_get(layer, hit, duration);
    }

    fn record_set(&self, layer: &str, success: bool, duration: Duration) {
        (**self).record_set(layer, success, duration);
    }

    fn record_delete(&self, layer: &str, success: bool, duration: Duration) {
        (**self).record_delete(layer, success, duration);
    }

    fn record_error(&self, layer: &str, operation: CacheOperation, kind: ErrorKind) {
        (**self).record_error(layer, operation, kind);
    }

    fn record_circuit_state(&self, layer: &str, state: CircuitState) {
        (**self).record_circuit_state(layer, state);
    }

    fn record_queue_depth(&self, layer: &str, depth: usize) {
        (**self).record_queue_depth(layer, depth);
    }

    fn record_write_dropped(&self, layer: &str) {
        (**self).record_write_dropped(layer);
    }

    fn record_async_write(&self, layer: &str, success: bool, duration: Duration) {
        (**self).record_async_write(layer, success, duration);
    }

    fn record_chain_get(&self, hit: bool, hit_layer: Option<usize>, duration: Duration) {
        (**self).record_chain_get(hit, hit_layer, duration);
    }
}

/// No-op metrics implementation (default)
///
/// Zero overhead when observability is not needed.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl CacheMetrics for NoopMetrics {
    #[inline]
    fn record_get(&self, _layer: &str, _hit: bool, _duration: Duration) {}

    #[inline]
    fn record_set(&self, _layer: &str, _success: bool, _duration: Duration) {}

    #[inline]
    fn record_delete(&self, _layer: &str, _success: bool, _duration: Duration) {}

    #[inline]
    fn record_error(&self, _layer: &str, _operation: CacheOperation, _kind: ErrorKind) {}

    #[inline]
    fn record_circuit_state(&self, _layer: &str, _state: CircuitState) {}

    #[inline]
    fn record_queue_depth(&self, _layer: &str, _depth: usize) {}

    #[inline]
    fn record_write_dropped(&self, _layer: &str) {}

    #[inline]
    fn record_async_write(&self, _layer: &str, _success: bool, _duration: Duration) {}

    #[inline]
    fn record_chain_get(&self, _hit: bool, _hit_layer: Option<usize>, _duration: Duration) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_as_str() {
        assert_eq!(CacheOperation::Get.as_str(), "get");
        assert_eq!(CacheOperation::Set.as_str(), "set");
        assert_eq!(CacheOperation::Delete.as_str(), "delete");
    }

    #[test]
    fn test_state_as_str() {
        assert_eq!(CircuitState::Closed.as_str(), "closed");
        assert_eq!(CircuitState::Open.as_str(), "open");
        assert_eq!(CircuitState::HalfOpen.as_str(), "half_open");
    }

    #[test]
    fn test_noop_metrics() {
        let metrics = NoopMetrics;
        // Just verify these don't panic
        metrics.record_get("l0", true, Duration::from_millis(1));
        metrics.record_error("l0", CacheOperation::Get, ErrorKind::Timeout);
        metrics.record_chain_get(false, None, Duration::from_millis(2));
    }
}
