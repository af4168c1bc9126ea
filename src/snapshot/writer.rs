//! Snapshot writer
//!
//! Keeps a full JSON mirror of the store on disk. Every mutation reads the
//! whole document, applies the change and writes the whole document back.

use super::format::{self, Document, SnapshotError};
use crate::store::Entry;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

/// Durable full-state mirror of the store
///
/// All operations are serialized by one lock, independent of the store's
/// own lock. Writes go to a temporary sibling file first and are renamed
/// over the snapshot, so a crash mid-write leaves the previous snapshot
/// intact.
pub struct SnapshotWriter {
    path: PathBuf,
    lock: Mutex<()>,
}

impl SnapshotWriter {
    /// Create a writer for the snapshot at `path`. No file is touched yet.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        SnapshotWriter {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    /// Path of the snapshot file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Load every entry from the snapshot.
    ///
    /// A missing file yields an empty map. Legacy bare values come back
    /// with no expiration. An unreadable or malformed file is an error.
    pub fn load_all<V: DeserializeOwned>(&self) -> Result<HashMap<String, Entry<V>>, SnapshotError> {
        let _guard = self.lock();
        let document = self.read_document()?;
        info!("Snapshot loaded from {:?}: {} entries", self.path, document.len());
        format::into_typed(document)
    }

    /// Number of keys currently in the snapshot
    pub fn count(&self) -> Result<usize, SnapshotError> {
        let _guard = self.lock();
        Ok(self.read_document()?.len())
    }

    /// Upsert one key and rewrite the snapshot
    pub fn put<V: Serialize>(&self, key: &str, value: &V, expires_at: Option<f64>) -> Result<(), SnapshotError> {
        let entry = format::to_raw(value, expires_at)?;

        let _guard = self.lock();
        let mut document = self.read_document()?;
        document.insert(key.to_string(), entry);
        self.write_document(&document)?;

        debug!("Snapshot put '{}' ({} entries)", key, document.len());
        Ok(())
    }

    /// Remove one key and rewrite the snapshot. Absent keys are ignored.
    pub fn delete(&self, key: &str) -> Result<(), SnapshotError> {
        let _guard = self.lock();
        let mut document = self.read_document()?;
        if document.remove(key).is_some() {
            self.write_document(&document)?;
            debug!("Snapshot delete '{}' ({} entries)", key, document.len());
        }
        Ok(())
    }

    /// Replace the whole snapshot with `entries`
    pub fn save_all<'a, V, I>(&self, entries: I) -> Result<(), SnapshotError>
    where
        V: Serialize + 'a,
        I: IntoIterator<Item = (&'a String, &'a Entry<V>)>,
    {
        let mut document = Document::new();
        for (key, entry) in entries {
            document.insert(key.clone(), format::to_raw(&entry.value, entry.expires_at)?);
        }

        let _guard = self.lock();
        self.write_document(&document)?;

        info!("Snapshot saved to {:?}: {} entries", self.path, document.len());
        Ok(())
    }

    /// Replace the whole snapshot with the entries returned by `source`.
    ///
    /// `source` runs with the snapshot lock held, so a per-key `put` or
    /// `delete` that completed before it cannot be overwritten by an older
    /// view of the store.
    pub fn resync<V, F>(&self, source: F) -> Result<usize, SnapshotError>
    where
        V: Serialize,
        F: FnOnce() -> HashMap<String, Entry<V>>,
    {
        let _guard = self.lock();

        let mut document = Document::new();
        for (key, entry) in source() {
            document.insert(key, format::to_raw(&entry.value, entry.expires_at)?);
        }
        self.write_document(&document)?;

        debug!("Snapshot resynchronized: {} entries", document.len());
        Ok(document.len())
    }

    /// Read and normalize the current document. Caller holds the lock.
    fn read_document(&self) -> Result<Document, SnapshotError> {
        match fs::read(&self.path) {
            Ok(data) => format::decode(&data),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Document::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write the document through a temp file and rename. Caller holds the lock.
    fn write_document(&self, document: &Document) -> Result<(), SnapshotError> {
        let bytes = format::encode(document)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = self.tmp_path();
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;

        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| OsString::from("snapshot"));
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    fn setup() -> (TempDir, SnapshotWriter) {
        let dir = TempDir::new().unwrap();
        let writer = SnapshotWriter::new(dir.path().join("data.json"));
        (dir, writer)
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let (_dir, writer) = setup();
        let entries: HashMap<String, Entry<Value>> = writer.load_all().unwrap();
        assert!(entries.is_empty());
        assert!(!writer.path().exists());
    }

    #[test]
    fn test_put_and_load() {
        let (_dir, writer) = setup();
        writer.put("a", &json!("x"), Some(1234.5)).unwrap();
        writer.put("b", &json!({"user": "alice"}), None).unwrap();

        let entries: HashMap<String, Entry<Value>> = writer.load_all().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries["a"].expires_at, Some(1234.5));
        assert_eq!(entries["b"], Entry::new(json!({"user": "alice"})));
    }

    #[test]
    fn test_put_replaces_existing() {
        let (_dir, writer) = setup();
        writer.put("a", &json!(1), Some(10.0)).unwrap();
        writer.put("a", &json!(2), None).unwrap();

        let entries: HashMap<String, Entry<Value>> = writer.load_all().unwrap();
        assert_eq!(entries["a"], Entry::new(json!(2)));
    }

    #[test]
    fn test_delete() {
        let (_dir, writer) = setup();
        writer.put("a", &json!(1), None).unwrap();
        writer.put("b", &json!(2), None).unwrap();

        writer.delete("a").unwrap();
        writer.delete("missing").unwrap();

        let entries: HashMap<String, Entry<Value>> = writer.load_all().unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries.contains_key("b"));
        assert_eq!(writer.count().unwrap(), 1);
    }

    #[test]
    fn test_delete_without_file_creates_nothing() {
        let (_dir, writer) = setup();
        writer.delete("missing").unwrap();
        assert!(!writer.path().exists());
        assert_eq!(writer.count().unwrap(), 0);
    }

    #[test]
    fn test_save_all_round_trip() {
        let (_dir, writer) = setup();
        writer.put("stale", &json!("old"), None).unwrap();

        let mapping: HashMap<String, Entry<Value>> = HashMap::from([
            ("plain".to_string(), Entry::new(json!([1, 2, 3]))),
            (
                "timed".to_string(),
                Entry {
                    value: json!({"deep": {"x": null}}),
                    expires_at: Some(1_900_000_000.25),
                },
            ),
        ]);
        writer.save_all(&mapping).unwrap();

        let loaded: HashMap<String, Entry<Value>> = writer.load_all().unwrap();
        assert_eq!(loaded, mapping);
    }

    #[test]
    fn test_legacy_document_loads() {
        let (_dir, writer) = setup();
        fs::write(writer.path(), r#"{"k": "bare-value"}"#).unwrap();

        let entries: HashMap<String, Entry<Value>> = writer.load_all().unwrap();
        assert_eq!(entries["k"], Entry::new(json!("bare-value")));
    }

    #[test]
    fn test_put_upgrades_legacy_document() {
        let (_dir, writer) = setup();
        fs::write(writer.path(), r#"{"old": 7}"#).unwrap();

        writer.put("new", &json!(8), None).unwrap();

        let raw: Value = serde_json::from_slice(&fs::read(writer.path()).unwrap()).unwrap();
        assert_eq!(
            raw,
            json!({
                "old": {"value": 7, "expires_at": null},
                "new": {"value": 8, "expires_at": null}
            })
        );
    }

    #[test]
    fn test_corrupt_file_is_error() {
        let (_dir, writer) = setup();
        fs::write(writer.path(), "{ truncated").unwrap();

        let result: Result<HashMap<String, Entry<Value>>, _> = writer.load_all();
        assert!(matches!(result, Err(SnapshotError::Corrupt(_))));
        assert!(writer.put("a", &json!(1), None).is_err());
    }

    #[test]
    fn test_creates_parent_directory() {
        let dir = TempDir::new().unwrap();
        let writer = SnapshotWriter::new(dir.path().join("nested/deeper/data.json"));

        writer.put("a", &json!(1), None).unwrap();
        assert!(writer.path().exists());
        assert!(!dir.path().join("nested/deeper/data.json.tmp").exists());
    }

    #[test]
    fn test_resync_replaces_document() {
        let (_dir, writer) = setup();
        writer.put("gone", &json!(1), Some(1.0)).unwrap();

        let written = writer
            .resync(|| HashMap::from([("kept".to_string(), Entry::new(json!(2)))]))
            .unwrap();
        assert_eq!(written, 1);

        let entries: HashMap<String, Entry<Value>> = writer.load_all().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries["kept"], Entry::new(json!(2)));
    }

    #[test]
    fn test_typed_values() {
        let (_dir, writer) = setup();
        writer.put("n", &42u32, None).unwrap();

        let entries: HashMap<String, Entry<u32>> = writer.load_all().unwrap();
        assert_eq!(entries["n"].value, 42);
    }
}
