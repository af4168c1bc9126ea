//! Entry structure for cached values

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time as fractional seconds since the Unix epoch.
///
/// Expiration timestamps are stored in this unit so they survive a restart
/// and can be written to the snapshot as-is.
pub fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// A cached value with its optional absolute expiration time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry<V> {
    /// The opaque value
    pub value: V,

    /// Expiration time in epoch seconds, `None` = never expires
    #[serde(default)]
    pub expires_at: Option<f64>,
}

impl<V> Entry<V> {
    /// Create a new entry without expiration
    pub fn new(value: V) -> Self {
        Entry {
            value,
            expires_at: None,
        }
    }

    /// Create a new entry expiring `ttl_seconds` from now
    pub fn with_ttl(value: V, ttl_seconds: i64) -> Self {
        Entry {
            value,
            expires_at: Some(unix_now() + ttl_seconds as f64),
        }
    }

    /// Check if the entry has expired
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(unix_now())
    }

    /// Check expiration against a given instant
    pub fn is_expired_at(&self, now: f64) -> bool {
        match self.expires_at {
            Some(expires_at) => now >= expires_at,
            None => false,
        }
    }

    /// Set expiration `seconds` from now. Non-positive values expire at once.
    pub fn set_expiration(&mut self, seconds: i64) {
        self.expires_at = Some(unix_now() + seconds as f64);
    }

    /// Remove expiration
    pub fn remove_expiration(&mut self) {
        self.expires_at = None;
    }

    /// Remaining lifetime of a live entry
    pub fn ttl(&self) -> Ttl {
        match self.expires_at {
            Some(expires_at) => {
                let remaining = (expires_at - unix_now()).floor();
                // Clamp so the wire code stays a non-negative i64
                let secs = (remaining.max(0.0) as u64).min(i64::MAX as u64);
                Ttl::Remaining(secs)
            }
            None => Ttl::NoExpiry,
        }
    }
}

/// Result of a TTL query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// Key does not exist or has expired
    NotFound,

    /// Key exists and never expires
    NoExpiry,

    /// Whole seconds left before the key expires
    Remaining(u64),
}

impl Ttl {
    /// Numeric code used on the wire:
    /// - `-2`: key not found
    /// - `-1`: no expiration
    /// - `n >= 0`: seconds remaining
    pub fn code(&self) -> i64 {
        match self {
            Ttl::NotFound => -2,
            Ttl::NoExpiry => -1,
            Ttl::Remaining(secs) => i64::try_from(*secs).unwrap_or(i64::MAX),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_without_expiration() {
        let entry = Entry::new("value");
        assert!(!entry.is_expired());
        assert_eq!(entry.ttl(), Ttl::NoExpiry);
    }

    #[test]
    fn test_entry_with_ttl() {
        let entry = Entry::with_ttl("value", 60);
        assert!(!entry.is_expired());
        match entry.ttl() {
            Ttl::Remaining(secs) => assert!(secs <= 60 && secs >= 59),
            other => panic!("unexpected ttl {:?}", other),
        }
    }

    #[test]
    fn test_zero_ttl_is_expired() {
        let entry = Entry::with_ttl("value", 0);
        assert!(entry.is_expired());
        assert_eq!(entry.ttl(), Ttl::Remaining(0));
    }

    #[test]
    fn test_expiration_boundary() {
        let entry = Entry {
            value: 1,
            expires_at: Some(100.0),
        };
        assert!(!entry.is_expired_at(99.9));
        assert!(entry.is_expired_at(100.0));
        assert!(entry.is_expired_at(100.1));
    }

    #[test]
    fn test_remove_expiration() {
        let mut entry = Entry::with_ttl("value", 10);
        entry.remove_expiration();
        assert_eq!(entry.expires_at, None);
        assert_eq!(entry.ttl(), Ttl::NoExpiry);
    }

    #[test]
    fn test_ttl_codes() {
        assert_eq!(Ttl::NotFound.code(), -2);
        assert_eq!(Ttl::NoExpiry.code(), -1);
        assert_eq!(Ttl::Remaining(0).code(), 0);
        assert_eq!(Ttl::Remaining(42).code(), 42);
        assert_eq!(Ttl::Remaining(u64::MAX).code(), i64::MAX);
    }

    #[test]
    fn test_far_future_expiration_code() {
        let mut entry = Entry::new("value");
        entry.set_expiration(i64::MAX);
        assert!(!entry.is_expired());
        assert!(entry.ttl().code() > 0);
    }

    #[test]
    fn test_huge_loaded_expiry_code() {
        let entry = Entry {
            value: 1,
            expires_at: Some(1e30),
        };
        assert_eq!(entry.ttl(), Ttl::Remaining(i64::MAX as u64));
        assert_eq!(entry.ttl().code(), i64::MAX);
    }
}
