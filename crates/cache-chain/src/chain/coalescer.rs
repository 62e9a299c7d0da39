use cache_chain_core::{CacheError, Result};
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast;

type Flight = broadcast::Sender<Result<Option<Vec<u8>>>>;

/// Single-flight map coalescing concurrent reads of the same key
///
/// The first caller for a key spawns the shared execution as a detached task
/// and every caller, leader included, waits on its broadcast result. A waiter
/// that drops out leaves the execution running, so later waiters still get
/// the result.
#[derive(Clone, Default)]
pub(crate) struct Coalescer {
    inflight: Arc<DashMap<String, Flight>>,
}

impl Coalescer {
    pub(crate) fn new() -> Self {
        Self {
            inflight: Arc::new(DashMap::new()),
        }
    }

    /// Run `f` for `key`, or join an execution already in flight
    pub(crate) async fn execute<F, Fut>(&self, key: &str, f: F) -> Result<Option<Vec<u8>>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<Vec<u8>>>> + Send + 'static,
    {
        // Scope the entry lock so it is released before awaiting
        let mut rx = {
            match self.inflight.entry(key.to_string()) {
                dashmap::mapref::entry::Entry::Occupied(occupied) => occupied.get().subscribe(),
                dashmap::mapref::entry::Entry::Vacant(vacant) => {
                    let (tx, rx) = broadcast::channel(1);
                    vacant.insert(tx.clone());

                    let inflight = self.inflight.clone();
                    let key = key.to_string();
                    let fut = f();
                    tokio::spawn(async move {
                        let result = fut.await;
                        // Remove before sending so a caller arriving after the
                        // broadcast starts a fresh flight instead of missing it
                        inflight.remove(&key);
                        let _ = tx.send(result);
                    });
                    rx
                }
            }
        };

        match rx.recv().await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Internal(
                "in-flight request aborted".to_string(),
            )),
        }
    }
}
