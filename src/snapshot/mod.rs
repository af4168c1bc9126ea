//! Snapshot persistence module
//!
//! Mirrors the store's full contents to a JSON document on disk. The
//! mirror is rewritten as a whole on every mutation and reloaded at
//! startup to seed the store.

mod format;
mod writer;

pub use format::{decode, encode, Document, SnapshotError};
pub use writer::SnapshotWriter;
