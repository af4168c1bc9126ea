//! Cache: the store and its snapshot, composed
//!
//! The store and the snapshot writer never call each other. This layer
//! sequences them the way every mutation needs: change the store first,
//! then mirror the key's resulting entry to the snapshot. Reads only touch
//! memory.
//!
//! A crash between the two steps loses the unmirrored change; on restart
//! the snapshot is trusted as of its last successful write.

use crate::config::Config;
use crate::snapshot::{SnapshotError, SnapshotWriter};
use crate::store::{Entry, Store, StoreStats, SweepHook, Sweeper, Ttl};
use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{error, info};

/// Store plus durable mirror
pub struct Cache<V> {
    store: Store<V>,
    snapshot: Arc<SnapshotWriter>,
    sweeper: Mutex<Option<Sweeper>>,
}

impl<V> Cache<V>
where
    V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Load the snapshot, seed the store and start the sweeper.
    ///
    /// Must run inside a Tokio runtime. An unreadable or corrupt snapshot
    /// is fatal: the cache refuses to start with unknown state.
    pub fn open(config: &Config) -> anyhow::Result<Self> {
        let snapshot = SnapshotWriter::new(&config.data_path);
        let entries: HashMap<String, Entry<V>> = snapshot
            .load_all()
            .with_context(|| format!("Failed to load snapshot {:?}", config.data_path))?;

        let store = Store::new();
        let loaded = store.load(entries);
        info!("Seeded store with {} entries from {:?}", loaded, config.data_path);

        let cache = Cache::new(store, snapshot);
        cache.start_sweeper(config.sweep_interval());
        Ok(cache)
    }

    /// Compose an existing store and writer, without a sweeper
    pub fn new(store: Store<V>, snapshot: SnapshotWriter) -> Self {
        Cache {
            store,
            snapshot: Arc::new(snapshot),
            sweeper: Mutex::new(None),
        }
    }

    /// Start the background sweep.
    ///
    /// A pass is followed by a full snapshot resync when it purged keys or
    /// when the snapshot holds a different number of keys than the store.
    /// The second check catches keys that `get` or `ttl` purged lazily
    /// since the last pass; until then those rows stay on disk, hidden on
    /// load because they have elapsed.
    ///
    /// Replaces any sweeper already running.
    pub fn start_sweeper(&self, interval: Duration) {
        let store = self.store.clone();
        let snapshot = Arc::clone(&self.snapshot);
        let hook: SweepHook = Box::new(move |removed| {
            let stale = removed > 0 || !snapshot.count().is_ok_and(|n| n == store.len());
            if !stale {
                return;
            }
            if let Err(e) = snapshot.resync(|| store.entries()) {
                error!("Snapshot resync after sweep failed: {}", e);
            }
        });

        let sweeper = Sweeper::spawn_with_hook(self.store.clone(), interval, Some(hook));
        let previous = self
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(sweeper);
        drop(previous);
    }

    /// Run a sweep on the background task right away
    pub fn trigger_sweep(&self) {
        if let Some(sweeper) = self
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            sweeper.trigger();
        }
    }

    /// Store a value, then mirror it
    pub fn put(&self, key: &str, value: V, ttl: Option<i64>) -> Result<(), SnapshotError> {
        self.store.put(key, value, ttl);
        self.mirror(key)
    }

    /// Live value for a key
    pub fn get(&self, key: &str) -> Option<V> {
        self.store.get(key)
    }

    /// Remove a key; the snapshot is updated only if the key was live
    pub fn delete(&self, key: &str) -> Result<Option<V>, SnapshotError> {
        let removed = self.store.delete(key);
        if removed.is_some() {
            self.snapshot.delete(key)?;
        }
        Ok(removed)
    }

    /// All live key/value pairs
    pub fn get_all(&self) -> HashMap<String, V> {
        self.store.get_all()
    }

    /// Set a key to expire in `seconds`, then mirror it
    pub fn expire(&self, key: &str, seconds: i64) -> Result<bool, SnapshotError> {
        if !self.store.expire(key, seconds) {
            return Ok(false);
        }
        self.mirror(key)?;
        Ok(true)
    }

    /// Remaining time to live for a key
    pub fn ttl(&self, key: &str) -> Ttl {
        self.store.ttl(key)
    }

    /// Make a key permanent, then mirror it
    pub fn persist(&self, key: &str) -> Result<bool, SnapshotError> {
        if !self.store.persist(key) {
            return Ok(false);
        }
        self.mirror(key)?;
        Ok(true)
    }

    /// Live key counts split by expiration kind
    pub fn stats(&self) -> StoreStats {
        self.store.stats()
    }

    /// Rewrite the snapshot from the store's current entries
    pub fn flush(&self) -> Result<usize, SnapshotError> {
        self.snapshot.resync(|| self.store.entries())
    }

    /// Stop the sweeper and flush the snapshot
    pub async fn shutdown(&self) -> Result<(), SnapshotError> {
        let sweeper = self
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(sweeper) = sweeper {
            sweeper.shutdown().await;
        }

        let written = self.flush()?;
        info!("Cache shut down, {} entries flushed", written);
        Ok(())
    }

    /// The in-memory store
    pub fn store(&self) -> &Store<V> {
        &self.store
    }

    /// The snapshot writer
    pub fn snapshot(&self) -> &SnapshotWriter {
        &self.snapshot
    }

    /// Copy the key's current entry to the snapshot
    fn mirror(&self, key: &str) -> Result<(), SnapshotError> {
        match self.store.entry(key) {
            Some(entry) => self.snapshot.put(key, &entry.value, entry.expires_at),
            None => Ok(()),
        }
    }
}
