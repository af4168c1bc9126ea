//! Snapshot document format
//!
//! The snapshot is a single JSON object mapping each key to
//! `{"value": ..., "expires_at": <epoch seconds | null>}`.
//!
//! Older snapshots mapped keys straight to their values. Any member that
//! is not an object carrying a `"value"` field is read as such a bare
//! value and gets no expiration.

use crate::store::Entry;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as Json;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io;

/// Normalized snapshot contents, values kept as raw JSON
pub type Document = BTreeMap<String, Entry<Json>>;

/// Errors raised while reading or writing a snapshot
#[derive(Debug)]
pub enum SnapshotError {
    /// The file could not be read or written
    Io(io::Error),

    /// The file exists but does not hold a valid snapshot
    Corrupt(String),

    /// A value could not be converted to or from JSON
    Encode(String),
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotError::Io(e) => write!(f, "Snapshot IO error: {}", e),
            SnapshotError::Corrupt(msg) => write!(f, "Corrupt snapshot: {}", msg),
            SnapshotError::Encode(msg) => write!(f, "Snapshot encoding error: {}", msg),
        }
    }
}

impl std::error::Error for SnapshotError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SnapshotError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for SnapshotError {
    fn from(e: io::Error) -> Self {
        SnapshotError::Io(e)
    }
}

/// Parse raw snapshot bytes into a normalized document
pub fn decode(data: &[u8]) -> Result<Document, SnapshotError> {
    let root: Json = serde_json::from_slice(data)
        .map_err(|e| SnapshotError::Corrupt(format!("invalid JSON: {}", e)))?;

    let members = match root {
        Json::Object(members) => members,
        other => {
            return Err(SnapshotError::Corrupt(format!(
                "expected an object at the root, found {}",
                json_kind(&other)
            )))
        }
    };

    let mut document = Document::new();
    for (key, raw) in members {
        let entry = decode_entry(&key, raw)?;
        document.insert(key, entry);
    }
    Ok(document)
}

/// Normalize one member of the root object
fn decode_entry(key: &str, raw: Json) -> Result<Entry<Json>, SnapshotError> {
    match raw {
        Json::Object(mut fields) if fields.contains_key("value") => {
            let value = fields.remove("value").unwrap_or(Json::Null);
            let expires_at = match fields.remove("expires_at") {
                None | Some(Json::Null) => None,
                Some(Json::Number(n)) => n.as_f64(),
                Some(other) => {
                    return Err(SnapshotError::Corrupt(format!(
                        "key '{}': expires_at must be a number or null, found {}",
                        key,
                        json_kind(&other)
                    )))
                }
            };
            Ok(Entry { value, expires_at })
        }
        // Legacy format: the member is the value itself
        bare => Ok(Entry::new(bare)),
    }
}

/// Serialize a document as pretty-printed JSON
pub fn encode(document: &Document) -> Result<Vec<u8>, SnapshotError> {
    serde_json::to_vec_pretty(document).map_err(|e| SnapshotError::Encode(e.to_string()))
}

/// Convert a typed entry to its raw JSON form
pub fn to_raw<V: Serialize>(value: &V, expires_at: Option<f64>) -> Result<Entry<Json>, SnapshotError> {
    let value = serde_json::to_value(value).map_err(|e| SnapshotError::Encode(e.to_string()))?;
    Ok(Entry { value, expires_at })
}

/// Convert every raw entry of a document into typed entries
pub fn into_typed<V: DeserializeOwned>(document: Document) -> Result<HashMap<String, Entry<V>>, SnapshotError> {
    document
        .into_iter()
        .map(|(key, entry)| {
            let value = serde_json::from_value(entry.value).map_err(|e| {
                SnapshotError::Corrupt(format!("key '{}': {}", key, e))
            })?;
            Ok((
                key,
                Entry {
                    value,
                    expires_at: entry.expires_at,
                },
            ))
        })
        .collect()
}

fn json_kind(value: &Json) -> &'static str {
    match value {
        Json::Null => "null",
        Json::Bool(_) => "a boolean",
        Json::Number(_) => "a number",
        Json::String(_) => "a string",
        Json::Array(_) => "an array",
        Json::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_current_format() {
        let data = br#"{
            "a": {"value": "x", "expires_at": 1700000000.5},
            "b": {"value": {"nested": [1, 2]}, "expires_at": null}
        }"#;

        let document = decode(data).unwrap();
        assert_eq!(document["a"].value, json!("x"));
        assert_eq!(document["a"].expires_at, Some(1700000000.5));
        assert_eq!(document["b"].value, json!({"nested": [1, 2]}));
        assert_eq!(document["b"].expires_at, None);
    }

    #[test]
    fn test_decode_legacy_bare_values() {
        let data = br#"{"k": "bare-value", "n": 42, "obj": {"other": true}}"#;

        let document = decode(data).unwrap();
        assert_eq!(document["k"], Entry::new(json!("bare-value")));
        assert_eq!(document["n"], Entry::new(json!(42)));
        // An object without a "value" field is a bare value too
        assert_eq!(document["obj"], Entry::new(json!({"other": true})));
    }

    #[test]
    fn test_decode_missing_expires_at() {
        let document = decode(br#"{"k": {"value": 1}}"#).unwrap();
        assert_eq!(document["k"], Entry::new(json!(1)));
    }

    #[test]
    fn test_decode_rejects_invalid_json() {
        assert!(matches!(decode(b"{not json"), Err(SnapshotError::Corrupt(_))));
        assert!(matches!(decode(b""), Err(SnapshotError::Corrupt(_))));
    }

    #[test]
    fn test_decode_rejects_non_object_root() {
        assert!(matches!(decode(b"[1, 2]"), Err(SnapshotError::Corrupt(_))));
    }

    #[test]
    fn test_decode_rejects_bad_expires_at() {
        let err = decode(br#"{"k": {"value": 1, "expires_at": "soon"}}"#).unwrap_err();
        assert!(err.to_string().contains("expires_at"));
    }

    #[test]
    fn test_encode_writes_null_expiry() {
        let mut document = Document::new();
        document.insert("k".to_string(), Entry::new(json!("v")));

        let bytes = encode(&document).unwrap();
        let parsed: Json = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed, json!({"k": {"value": "v", "expires_at": null}}));
    }

    #[test]
    fn test_into_typed_reports_mismatch() {
        let mut document = Document::new();
        document.insert("k".to_string(), Entry::new(json!("not a number")));

        let result = into_typed::<u64>(document);
        assert!(matches!(result, Err(SnapshotError::Corrupt(_))));
    }
}
