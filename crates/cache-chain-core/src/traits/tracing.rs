use crate::{CacheMetrics, CacheOperation, CircuitState, ErrorKind};
use std::time::Duration;
use tracing::{debug, info, trace};

/// Metrics adapter that logs events via `tracing`
#[derive(Debug, Clone, Default)]
pub struct TracingMetrics {
    /// Service name/prefix (optional)
    service_name: Option<String>,
}

impl TracingMetrics {
    /// Create new tracing metrics adapter
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with service name prefix
    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }
}

impl CacheMetrics for TracingMetrics {
    fn record_get(&self, layer: &str, hit: bool, duration: Duration) {
        debug!(
            target: "cache_chain",
            event = "get",
            layer = %layer,
            hit = hit,
            duration_us = duration.as_micros() as u64,
            service = ?self.service_name,
            "Layer Get"
        );
    }

    fn record_set(&self, layer: &str, success: bool, duration: Duration) {
        debug!(
            target: "cache_chain",
            event = "set",
            layer = %layer,
            success = success,
            duration_us = duration.as_micros() as u64,
            service = ?self.service_name,
            "Layer Set"
        );
    }

    fn record_delete(&self, layer: &str, success: bool, duration: Duration) {
        debug!(
            target: "cache_chain",
            event = "delete",
            layer = %layer,
            success = success,
            duration_us = duration.as_micros() as u64,
            service = ?self.service_name,
            "Layer Delete"
        );
    }

    fn record_error(&self, layer: &str, operation: CacheOperation, kind: ErrorKind) {
        debug!(
            target: "cache_chain",
            event = "error",
            layer = %layer,
            operation = operation.as_str(),
            error_type = kind.as_str(),
            service = ?self.service_name,
            "Layer Error"
        );
    }

    fn record_circuit_state(&self, layer: &str, state: CircuitState) {
        info!(
            target: "cache_chain",
            event = "circuit_state",
            layer = %layer,
            state = state.as_str(),
            service = ?self.service_name,
            "Circuit State Change"
        );
    }

    fn record_queue_depth(&self, layer: &str, depth: usize) {
        trace!(
            target: "cache_chain",
            event = "queue_depth",
            layer = %layer,
            depth = depth,
            service = ?self.service_name,
            "Warm-up Queue Depth"
        );
    }

    fn record_write_dropped(&self, layer: &str) {
        debug!(
            target: "cache_chain",
            event = "write_dropped",
            layer = %layer,
            service = ?self.service_name,
            "Warm-up Write Dropped"
        );
    }

    fn record_async_write(&self, layer: &str, success: bool, duration: Duration) {
        trace!(
            target: "cache_chain",
            event = "async_write",
            layer = %layer,
            success = success,
            duration_us = duration.as_micros() as u64,
            service = ?self.service_name,
            "Warm-up Write"
        );
    }

    fn record_chain_get(&self, hit: bool, hit_layer: Option<usize>, duration: Duration) {
        debug!(
            target: "cache_chain",
            event = "chain_get",
            hit = hit,
            hit_layer = ?hit_layer,
            duration_us = duration.as_micros() as u64,
            service = ?self.service_name,
            "Chain Get"
        );
    }
}
