//! In-memory storage module
//!
//! Provides the key/value map with per-key expiration, the locked handle
//! shared between callers, and the background sweep that purges expired
//! keys nobody reads anymore.
//! This module is independent of the snapshot and the HTTP layer.

mod entry;
mod memory;
mod shared;
mod sweeper;

pub use entry::{unix_now, Entry, Ttl};
pub use memory::{MemoryStore, StoreStats};
pub use shared::Store;
pub use sweeper::{SweepHook, Sweeper};
