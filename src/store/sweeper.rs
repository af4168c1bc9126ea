//! Background expiration sweep
//!
//! Lazy expiration alone never frees keys that are written with a TTL and
//! then never read again. The sweeper wakes on a fixed interval and purges
//! every elapsed entry under the store lock.

use super::shared::Store;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Hook invoked after each sweep with the number of purged keys
pub type SweepHook = Box<dyn Fn(usize) + Send + Sync + 'static>;

/// Handle to a running sweep task
///
/// The task stops when [`Sweeper::shutdown`] is awaited or when the handle
/// is dropped.
pub struct Sweeper {
    cancel: CancellationToken,
    wake: Arc<Notify>,
    handle: Option<JoinHandle<()>>,
}

impl Sweeper {
    /// Spawn a sweep task on the current Tokio runtime
    pub fn spawn<V>(store: Store<V>, interval: Duration) -> Self
    where
        V: Send + 'static,
    {
        Self::spawn_with_hook(store, interval, None)
    }

    /// Spawn a sweep task that calls `hook` after every pass
    pub fn spawn_with_hook<V>(store: Store<V>, interval: Duration, hook: Option<SweepHook>) -> Self
    where
        V: Send + 'static,
    {
        let cancel = CancellationToken::new();
        let wake = Arc::new(Notify::new());

        let handle = tokio::spawn(Self::run(
            store,
            interval,
            hook,
            cancel.clone(),
            Arc::clone(&wake),
        ));

        info!("Expiration sweeper started (interval {:?})", interval);

        Sweeper {
            cancel,
            wake,
            handle: Some(handle),
        }
    }

    async fn run<V>(
        store: Store<V>,
        interval: Duration,
        hook: Option<SweepHook>,
        cancel: CancellationToken,
        wake: Arc<Notify>,
    ) {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
                _ = wake.notified() => {}
            }

            let removed = store.sweep();
            if removed > 0 {
                info!("Cleaned up {} expired keys", removed);
            } else {
                debug!("Sweep found no expired keys");
            }

            if let Some(ref hook) = hook {
                hook(removed);
            }
        }

        debug!("Expiration sweeper stopped");
    }

    /// Run a sweep now instead of waiting for the next tick
    pub fn trigger(&self) {
        self.wake.notify_one();
    }

    /// Stop the task and wait for it to finish
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }

    /// Check whether the task is still running
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().map(|h| !h.is_finished()).unwrap_or(false)
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
