//! CinderKV - a small in-memory key/value cache with per-key TTL
//!
//! The crate is split into loosely coupled modules:
//! - `store`: the live key map, lazy expiration and the background sweep
//! - `snapshot`: the JSON mirror on disk, reloaded at startup
//! - `cache`: composes the two so each mutation is mirrored after it lands
//! - `web`: HTTP adapter translating requests into cache operations
//! - `config`: settings with defaults, file and environment overrides

pub mod cache;
pub mod config;
pub mod snapshot;
pub mod store;
pub mod web;

/// Re-export commonly used types
pub use cache::Cache;
pub use config::{Config, ConfigError};
pub use snapshot::{SnapshotError, SnapshotWriter};
pub use store::{Entry, MemoryStore, Store, StoreStats, Sweeper, Ttl};
