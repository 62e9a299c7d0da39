mod backend;
mod metrics;

pub use backend::{CacheBackend, ClearableBackend};
pub use metrics::{CacheMetrics, CacheOperation, CircuitState, NoopMetrics};

#[cfg(feature = "tracing")]
mod tracing;
#[cfg(feature = "tracing")]
pub use tracing::TracingMetrics;

#[cfg(feature = "metrics")]
mod recorder;
#[cfg(feature = "metrics")]
pub use recorder::MetricsRecorder;
