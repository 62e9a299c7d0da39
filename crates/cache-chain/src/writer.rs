//! Asynchronous warm-up writer

use cache_chain_core::{CacheBackend, CacheError, CacheMetrics, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// How often the current queue depth is published to the metrics sink
const DEPTH_REPORT_INTERVAL: Duration = Duration::from_secs(5);

/// Configuration for one layer's warm-up writer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriterConfig {
    /// Bounded queue capacity
    pub queue_size: usize,
    /// Number of worker tasks consuming the queue
    pub workers: usize,
    /// How long an enqueue may block before the write is dropped
    pub max_wait: Duration,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            queue_size: 1000,
            workers: 2,
            max_wait: Duration::from_millis(10),
        }
    }
}

impl WriterConfig {
    /// Set the queue capacity
    pub fn queue_size(mut self, queue_size: usize) -> Self {
        self.queue_size = queue_size;
        self
    }

    /// Set the worker count
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the enqueue deadline
    pub fn max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// Validate construction-time parameters
    pub fn validate(&self) -> Result<()> {
        if self.queue_size == 0 {
            return Err(CacheError::Configuration(
                "writer queue_size must be at least 1".to_string(),
            ));
        }
        if self.workers == 0 {
            return Err(CacheError::Configuration(
                "writer workers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Writer counters
#[derive(Debug, Default)]
pub struct WriterStats {
    total_writes: AtomicU64,
    dropped_writes: AtomicU64,
    failed_writes: AtomicU64,
}

impl WriterStats {
    /// Writes accepted into the queue
    pub fn total_writes(&self) -> u64 {
        self.total_writes.load(Ordering::Relaxed)
    }

    /// Writes dropped because the queue stayed full past the deadline
    pub fn dropped_writes(&self) -> u64 {
        self.dropped_writes.load(Ordering::Relaxed)
    }

    /// Writes that reached a worker but failed on the layer
    pub fn failed_writes(&self) -> u64 {
        self.failed_writes.load(Ordering::Relaxed)
    }
}

struct WriteJob {
    key: String,
    value: Vec<u8>,
    ttl: Option<Duration>,
}

/// Undoes a pending-count reservation unless the enqueue landed
struct PendingGuard<'a> {
    pending: &'a AtomicUsize,
    armed: bool,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.pending.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

/// Bounded-queue worker pool performing best-effort writes to one layer
///
/// The writer is attached to exactly one wrapped layer and populates it off
/// the hot read path. Enqueue blocks for at most `max_wait`; past that the
/// write is dropped and counted, never surfaced. Workers run under their own
/// tasks, so a caller abandoning its read never cancels a warm-up in flight.
/// On close the queue is drained before the workers exit.
pub struct AsyncWriter {
    layer_name: String,
    tx: Mutex<Option<mpsc::Sender<WriteJob>>>,
    pending: Arc<AtomicUsize>,
    stats: Arc<WriterStats>,
    closed: AtomicBool,
    shutdown: watch::Sender<bool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    metrics: Arc<dyn CacheMetrics>,
    max_wait: Duration,
}

impl AsyncWriter {
    /// Spawn workers and the depth reporter for the given layer
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(
        layer: Arc<dyn CacheBackend>,
        config: WriterConfig,
        metrics: Arc<dyn CacheMetrics>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_size.max(1));
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let pending = Arc::new(AtomicUsize::new(0));
        let stats = Arc::new(WriterStats::default());
        let (shutdown, shutdown_rx) = watch::channel(false);
        let layer_name = layer.name().to_string();

        let mut handles = Vec::with_capacity(config.workers.max(1) + 1);
        for _ in 0..config.workers.max(1) {
            handles.push(tokio::spawn(Self::worker_loop(
                layer.clone(),
                rx.clone(),
                pending.clone(),
                stats.clone(),
                metrics.clone(),
                layer_name.clone(),
            )));
        }
        handles.push(tokio::spawn(Self::depth_reporter(
            layer_name.clone(),
            pending.clone(),
            metrics.clone(),
            shutdown_rx,
        )));

        Self {
            layer_name,
            tx: Mutex::new(Some(tx)),
            pending,
            stats,
            closed: AtomicBool::new(false),
            shutdown,
            handles: Mutex::new(handles),
            metrics,
            max_wait: config.max_wait,
        }
    }

    /// Enqueue a warm-up write, blocking up to `max_wait` for a queue slot
    ///
    /// Returns `QueueFull` when the deadline passes and `WriterClosed` after
    /// shutdown; neither is ever escalated by the chain.
    pub async fn write(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(CacheError::WriterClosed);
        }
        let Some(tx) = self.tx.lock().clone() else {
            return Err(CacheError::WriterClosed);
        };

        let job = WriteJob {
            key: key.to_string(),
            value,
            ttl,
        };

        // Reserve the pending slot up front; the guard releases it on every
        // path where the job never reaches the queue, including caller drop.
        self.pending.fetch_add(1, Ordering::AcqRel);
        let mut guard = PendingGuard {
            pending: &*self.pending,
            armed: true,
        };

        match tokio::time::timeout(self.max_wait, tx.send(job)).await {
            Ok(Ok(())) => {
                guard.armed = false;
                self.stats.total_writes.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Ok(Err(_)) => Err(CacheError::WriterClosed),
            Err(_) => {
                self.stats.dropped_writes.fetch_add(1, Ordering::Relaxed);
                self.metrics.record_write_dropped(&self.layer_name);
                Err(CacheError::QueueFull)
            }
        }
    }

    /// Queued plus in-flight writes
    pub fn queue_depth(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Writer counters
    pub fn stats(&self) -> &WriterStats {
        &self.stats
    }

    /// Name of the layer this writer warms
    pub fn layer_name(&self) -> &str {
        &self.layer_name
    }

    /// Wait until every queued write has been applied
    pub async fn flush(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        while self.pending.load(Ordering::Acquire) > 0 {
            if Instant::now() >= deadline {
                return Err(CacheError::FlushTimeout);
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        Ok(())
    }

    /// Stop intake, drain the queue, and wait for the workers to exit
    ///
    /// Idempotent; concurrent callers after the first return immediately.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        // Dropping the sender lets the workers drain the remaining jobs and
        // observe channel closure.
        self.tx.lock().take();
        let _ = self.shutdown.send(true);

        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.handles.lock());
        for handle in handles {
            let _ = handle.await;
        }
    }

    async fn worker_loop(
        layer: Arc<dyn CacheBackend>,
        rx: Arc<tokio::sync::Mutex<mpsc::Receiver<WriteJob>>>,
        pending: Arc<AtomicUsize>,
        stats: Arc<WriterStats>,
        metrics: Arc<dyn CacheMetrics>,
        layer_name: String,
    ) {
        loop {
            let job = { rx.lock().await.recv().await };
            let Some(job) = job else {
                // Channel closed and fully drained
                break;
            };

            let start = Instant::now();
            let result = layer.set(&job.key, job.value, job.ttl).await;
            metrics.record_async_write(&layer_name, result.is_ok(), start.elapsed());
            if let Err(error) = result {
                stats.failed_writes.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    target: "cache_chain",
                    layer = %layer_name,
                    key = %job.key,
                    %error,
                    "warm-up write failed"
                );
            }
            pending.fetch_sub(1, Ordering::AcqRel);
        }
    }

    async fn depth_reporter(
        layer_name: String,
        pending: Arc<AtomicUsize>,
        metrics: Arc<dyn CacheMetrics>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval(DEPTH_REPORT_INTERVAL);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    metrics.record_queue_depth(&layer_name, pending.load(Ordering::Acquire));
                }
                _ = shutdown.changed() => break,
            }
        }
    }
}
