//! Thread-safe store handle
//!
//! Wraps a [`MemoryStore`] in a single mutex. Every operation takes the
//! lock once and performs its check and mutation inside it, so concurrent
//! callers never observe an expired entry or a half-applied update.

use super::entry::{Entry, Ttl};
use super::memory::{MemoryStore, StoreStats};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Cloneable handle to a shared in-memory store
///
/// Clones share the same underlying map, so a handle can be given to
/// request handlers and to the background [`super::Sweeper`] alike.
pub struct Store<V> {
    inner: Arc<Mutex<MemoryStore<V>>>,
}

impl<V> Clone for Store<V> {
    fn clone(&self) -> Self {
        Store {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> Store<V> {
    /// Create an empty store
    pub fn new() -> Self {
        Self::from_memory(MemoryStore::new())
    }

    /// Wrap an already populated memory store
    pub fn from_memory(memory: MemoryStore<V>) -> Self {
        Store {
            inner: Arc::new(Mutex::new(memory)),
        }
    }

    /// Acquire the store lock.
    ///
    /// A panic while holding the lock cannot leave the map structurally
    /// broken, so a poisoned lock is simply taken over.
    fn lock(&self) -> MutexGuard<'_, MemoryStore<V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed the store with entries loaded from a snapshot
    ///
    /// Existing keys with the same name are replaced. Expiration times are
    /// kept as loaded; already elapsed entries are purged on first access.
    pub fn load(&self, entries: impl IntoIterator<Item = (String, Entry<V>)>) -> usize {
        let mut store = self.lock();
        let mut count = 0;
        for (key, entry) in entries {
            store.insert_entry(key, entry);
            count += 1;
        }
        count
    }

    /// Insert or replace a key with an optional TTL in seconds
    pub fn put(&self, key: impl Into<String>, value: V, ttl: Option<i64>) {
        let key = key.into();
        debug!(key = %key, ?ttl, "put");
        self.lock().put(key, value, ttl);
    }

    /// Remove a key, returning its value if it was live
    pub fn delete(&self, key: &str) -> Option<V> {
        debug!(key, "delete");
        self.lock().delete(key)
    }

    /// Set a key to expire `seconds` from now
    pub fn expire(&self, key: &str, seconds: i64) -> bool {
        debug!(key, seconds, "expire");
        self.lock().expire(key, seconds)
    }

    /// Remove the expiration of a key
    pub fn persist(&self, key: &str) -> bool {
        debug!(key, "persist");
        self.lock().persist(key)
    }

    /// Remaining time to live of a key
    pub fn ttl(&self, key: &str) -> Ttl {
        self.lock().ttl(key)
    }

    /// Run a closure against the locked map.
    ///
    /// The lock is held for the duration of the closure only; the guard
    /// itself never escapes.
    pub fn inspect<R>(&self, f: impl FnOnce(&MemoryStore<V>) -> R) -> R {
        let store = self.lock();
        f(&store)
    }

    /// Purge every expired entry. Returns the number of keys removed.
    pub fn sweep(&self) -> usize {
        self.lock().cleanup_expired()
    }

    /// Purge expired entries, then count live keys by expiration kind
    pub fn stats(&self) -> StoreStats {
        let mut store = self.lock();
        store.cleanup_expired();
        store.stats()
    }

    /// Number of entries held, including expired ones not yet purged
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Check if the store holds no entries
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl<V: Clone> Store<V> {
    /// Get a live value by key
    pub fn get(&self, key: &str) -> Option<V> {
        self.lock().get(key).cloned()
    }

    /// All live key/value pairs; expired entries are purged
    pub fn get_all(&self) -> HashMap<String, V> {
        self.lock().get_all()
    }

    /// Raw entry for a key, including its expiration metadata
    pub fn entry(&self, key: &str) -> Option<Entry<V>> {
        self.lock().entry(key).cloned()
    }

    /// Copy of every raw entry, expired ones included
    pub fn entries(&self) -> HashMap<String, Entry<V>> {
        self.lock()
            .entries()
            .map(|(key, entry)| (key.clone(), entry.clone()))
            .collect()
    }
}

impl<V> Default for Store<V> {
    fn default() -> Self {
        Self::new()
    }
}
