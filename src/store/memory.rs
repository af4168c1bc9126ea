//! In-memory storage implementation

use super::entry::{unix_now, Entry, Ttl};
use serde::Serialize;
use siphasher::sip::SipHasher13;
use std::collections::HashMap;
use std::hash::BuildHasherDefault;

/// Type alias for our hash map with SipHasher
type StoreMap<V> = HashMap<String, Entry<V>, BuildHasherDefault<SipHasher13>>;

/// In-memory key-value map with lazy expiration
///
/// This type holds no lock of its own: every method takes `&self` or
/// `&mut self` and relies on the caller for exclusion. [`super::Store`]
/// wraps it in a mutex so each call below runs as one atomic step.
///
/// An entry whose `expires_at` has elapsed is treated as absent by every
/// read and is removed as soon as it is discovered.
pub struct MemoryStore<V> {
    store: StoreMap<V>,
}

impl<V> MemoryStore<V> {
    /// Create a new memory store with default capacity
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    /// Create a new memory store with specified initial capacity
    pub fn with_capacity(capacity: usize) -> Self {
        MemoryStore {
            store: HashMap::with_capacity_and_hasher(
                capacity,
                BuildHasherDefault::<SipHasher13>::default(),
            ),
        }
    }

    /// Insert or replace a key. `Some(ttl)` sets `expires_at = now + ttl`.
    ///
    /// Returns true if the key was not present before.
    pub fn put(&mut self, key: impl Into<String>, value: V, ttl: Option<i64>) -> bool {
        let entry = match ttl {
            Some(seconds) => Entry::with_ttl(value, seconds),
            None => Entry::new(value),
        };
        self.store.insert(key.into(), entry).is_none()
    }

    /// Insert a fully formed entry, keeping its expiration as-is
    pub fn insert_entry(&mut self, key: impl Into<String>, entry: Entry<V>) {
        self.store.insert(key.into(), entry);
    }

    /// Get a value by key, returns None if not found or expired
    pub fn get(&mut self, key: &str) -> Option<&V> {
        if self.purge_if_expired(key) {
            return None;
        }
        self.store.get(key).map(|entry| &entry.value)
    }

    /// Remove a key and return its value.
    ///
    /// An expired entry that was still present is removed but reported
    /// as absent.
    pub fn delete(&mut self, key: &str) -> Option<V> {
        let entry = self.store.remove(key)?;
        if entry.is_expired() {
            None
        } else {
            Some(entry.value)
        }
    }

    /// Set expiration on an existing key (TTL in seconds).
    ///
    /// Any integer is accepted; non-positive values make the key expire
    /// on the next access or sweep.
    pub fn expire(&mut self, key: &str, seconds: i64) -> bool {
        match self.store.get_mut(key) {
            Some(entry) => {
                entry.set_expiration(seconds);
                true
            }
            None => false,
        }
    }

    /// Remove the expiration of a key
    pub fn persist(&mut self, key: &str) -> bool {
        match self.store.get_mut(key) {
            Some(entry) => {
                entry.remove_expiration();
                true
            }
            None => false,
        }
    }

    /// Get TTL for a key, purging it if it already expired
    pub fn ttl(&mut self, key: &str) -> Ttl {
        if self.purge_if_expired(key) {
            return Ttl::NotFound;
        }
        match self.store.get(key) {
            Some(entry) => entry.ttl(),
            None => Ttl::NotFound,
        }
    }

    /// Get the raw entry for a key (including expiration metadata)
    pub fn entry(&self, key: &str) -> Option<&Entry<V>> {
        self.store.get(key)
    }

    /// Iterate over all raw entries, expired ones included
    pub fn entries(&self) -> impl Iterator<Item = (&String, &Entry<V>)> {
        self.store.iter()
    }

    /// Remove every expired entry. Returns the number of keys removed.
    pub fn cleanup_expired(&mut self) -> usize {
        let now = unix_now();
        let before = self.store.len();
        self.store.retain(|_, entry| !entry.is_expired_at(now));
        before - self.store.len()
    }

    /// Number of entries held, including expired ones not yet purged
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Count live keys, split by whether they carry an expiration
    pub fn stats(&self) -> StoreStats {
        let now = unix_now();
        let mut stats = StoreStats::default();

        for entry in self.store.values().filter(|e| !e.is_expired_at(now)) {
            stats.total_keys += 1;
            if entry.expires_at.is_some() {
                stats.expiring_keys += 1;
            } else {
                stats.persistent_keys += 1;
            }
        }

        stats
    }

    /// Remove the key if it has expired; returns true when it was removed
    fn purge_if_expired(&mut self, key: &str) -> bool {
        let expired = self
            .store
            .get(key)
            .map(|entry| entry.is_expired())
            .unwrap_or(false);

        if expired {
            self.store.remove(key);
        }
        expired
    }
}

impl<V: Clone> MemoryStore<V> {
    /// Collect all live key/value pairs, purging expired entries on the way
    pub fn get_all(&mut self) -> HashMap<String, V> {
        self.cleanup_expired();
        self.store
            .iter()
            .map(|(key, entry)| (key.clone(), entry.value.clone()))
            .collect()
    }
}

impl<V> Default for MemoryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics about the memory store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub total_keys: usize,
    pub persistent_keys: usize,
    pub expiring_keys: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_put_get() {
        let mut store = MemoryStore::new();
        assert!(store.put("key1", "value1", None));
        assert_eq!(store.get("key1"), Some(&"value1"));
        assert_eq!(store.get("missing"), None);
    }

    #[test]
    fn test_put_replaces_entry() {
        let mut store = MemoryStore::new();
        store.put("key1", 1, Some(60));
        assert!(!store.put("key1", 2, None));

        assert_eq!(store.get("key1"), Some(&2));
        assert_eq!(store.ttl("key1"), Ttl::NoExpiry);
    }

    #[test]
    fn test_expired_get_purges() {
        let mut store = MemoryStore::new();
        store.put("key1", "value1", Some(0));

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("key1"), None);
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_delete() {
        let mut store = MemoryStore::new();
        store.put("key1", "value1", None);

        assert_eq!(store.delete("key1"), Some("value1"));
        assert_eq!(store.delete("key1"), None);
        assert_eq!(store.delete("key1"), None);
    }

    #[test]
    fn test_delete_expired_reports_absent() {
        let mut store = MemoryStore::new();
        store.put("key1", "value1", Some(-5));

        assert_eq!(store.delete("key1"), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_get_all_excludes_expired() {
        let mut store = MemoryStore::new();
        store.put("a", 1, Some(0));
        store.put("b", 2, None);

        let all = store.get_all();
        assert_eq!(all.len(), 1);
        assert_eq!(all.get("b"), Some(&2));
        assert!(store.entry("a").is_none());
    }

    #[test]
    fn test_expire_and_persist() {
        let mut store = MemoryStore::new();
        store.put("key1", "value1", None);

        assert!(store.expire("key1", 100));
        assert!(matches!(store.ttl("key1"), Ttl::Remaining(s) if s <= 100));

        assert!(store.persist("key1"));
        assert_eq!(store.ttl("key1"), Ttl::NoExpiry);

        assert!(!store.expire("missing", 10));
        assert!(!store.persist("missing"));
    }

    #[test]
    fn test_expire_non_positive_expires_key() {
        let mut store = MemoryStore::new();
        store.put("key1", "value1", None);

        assert!(store.expire("key1", 0));
        assert_eq!(store.get("key1"), None);
    }

    #[test]
    fn test_expire_touches_unpurged_entry() {
        let mut store = MemoryStore::new();
        store.put("key1", "value1", Some(-1));

        assert!(store.expire("key1", 60));
        assert_eq!(store.get("key1"), Some(&"value1"));
    }

    #[test]
    fn test_ttl_not_found_purges() {
        let mut store = MemoryStore::new();
        store.put("key1", "value1", Some(0));

        assert_eq!(store.ttl("missing"), Ttl::NotFound);
        assert_eq!(store.ttl("key1"), Ttl::NotFound);
        assert!(store.is_empty());
    }

    #[test]
    fn test_cleanup_expired() {
        let mut store = MemoryStore::new();
        store.put("gone1", 1, Some(0));
        store.put("gone2", 2, Some(-10));
        store.put("keep", 3, Some(60));
        store.put("forever", 4, None);

        assert_eq!(store.cleanup_expired(), 2);
        assert_eq!(store.len(), 2);
        assert_eq!(store.cleanup_expired(), 0);
    }

    #[test]
    fn test_insert_entry_keeps_expiration() {
        let mut store = MemoryStore::new();
        store.insert_entry(
            "old",
            Entry {
                value: "v",
                expires_at: Some(1.0),
            },
        );

        assert_eq!(store.entry("old").and_then(|e| e.expires_at), Some(1.0));
        assert_eq!(store.get("old"), None);
    }

    #[test]
    fn test_stats() {
        let mut store = MemoryStore::new();
        store.put("a", 1, None);
        store.put("b", 2, None);
        store.put("c", 3, Some(60));
        store.put("d", 4, Some(0));

        let stats = store.stats();
        assert_eq!(
            stats,
            StoreStats {
                total_keys: 3,
                persistent_keys: 2,
                expiring_keys: 1,
            }
        );
    }
}
