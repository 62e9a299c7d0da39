use crate::{CacheMetrics, CacheOperation, CircuitState, ErrorKind};
use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Metrics adapter publishing to the `metrics` crate facade
///
/// Pair with any installed recorder (Prometheus exporter, statsd bridge).
/// Metric names are prefixed `cache_chain_`; the layer name is a label.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsRecorder;

impl MetricsRecorder {
    /// Create new recorder adapter
    pub fn new() -> Self {
        Self
    }
}

impl CacheMetrics for MetricsRecorder {
    fn record_get(&self, layer: &str, hit: bool, duration: Duration) {
        let result = if hit { "hit" } else { "miss" };
        counter!("cache_chain_layer_gets_total", "layer" => layer.to_string(), "result" => result)
            .increment(1);
        histogram!("cache_chain_layer_get_seconds", "layer" => layer.to_string())
            .record(duration.as_secs_f64());
    }

    fn record_set(&self, layer: &str, success: bool, duration: Duration) {
        let result = if success { "ok" } else { "error" };
        counter!("cache_chain_layer_sets_total", "layer" => layer.to_string(), "result" => result)
            .increment(1);
        histogram!("cache_chain_layer_set_seconds", "layer" => layer.to_string())
            .record(duration.as_secs_f64());
    }

    fn record_delete(&self, layer: &str, success: bool, duration: Duration) {
        let result = if success { "ok" } else { "error" };
        counter!("cache_chain_layer_deletes_total", "layer" => layer.to_string(), "result" => result)
            .increment(1);
        histogram!("cache_chain_layer_delete_seconds", "layer" => layer.to_string())
            .record(duration.as_secs_f64());
    }

    fn record_error(&self, layer: &str, operation: CacheOperation, kind: ErrorKind) {
        counter!(
            "cache_chain_layer_errors_total",
            "layer" => layer.to_string(),
            "operation" => operation.as_str(),
            "error_type" => kind.as_str()
        )
        .increment(1);
    }

    fn record_circuit_state(&self, layer: &str, state: CircuitState) {
        gauge!("cache_chain_circuit_state", "layer" => layer.to_string())
            .set(f64::from(state as u8));
        counter!(
            "cache_chain_circuit_transitions_total",
            "layer" => layer.to_string(),
            "state" => state.as_str()
        )
        .increment(1);
    }

    fn record_queue_depth(&self, layer: &str, depth: usize) {
        gauge!("cache_chain_writer_queue_depth", "layer" => layer.to_string()).set(depth as f64);
    }

    fn record_write_dropped(&self, layer: &str) {
        counter!("cache_chain_writer_dropped_total", "layer" => layer.to_string()).increment(1);
    }

    fn record_async_write(&self, layer: &str, success: bool, duration: Duration) {
        let result = if success { "ok" } else { "error" };
        counter!("cache_chain_writer_writes_total", "layer" => layer.to_string(), "result" => result)
            .increment(1);
        histogram!("cache_chain_writer_write_seconds", "layer" => layer.to_string())
            .record(duration.as_secs_f64());
    }

    fn record_chain_get(&self, hit: bool, hit_layer: Option<usize>, duration: Duration) {
        let result = if hit { "hit" } else { "miss" };
        let layer = hit_layer.map_or_else(|| "none".to_string(), |i| i.to_string());
        counter!("cache_chain_gets_total", "result" => result, "hit_layer" => layer).increment(1);
        histogram!("cache_chain_get_seconds").record(duration.as_secs_f64());
    }
}
