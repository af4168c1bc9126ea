//! HTTP handlers
//!
//! Each handler validates its input, calls one cache operation and turns
//! the result into a JSON response. Missing keys map to 404, malformed
//! input to 400, and snapshot write failures to 500.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;
use tracing::{debug, error};

use crate::cache::Cache;
use crate::snapshot::SnapshotError;
use crate::store::Ttl;

/// Shared application state
pub type AppState = Arc<Cache<JsonValue>>;

/// Body of `POST /put`
#[derive(Debug, Deserialize)]
pub struct PutRequest {
    pub key: Option<String>,
    #[serde(default)]
    pub value: JsonValue,
    #[serde(default)]
    pub ttl: JsonValue,
}

/// Body of `POST /expire`
#[derive(Debug, Deserialize)]
pub struct ExpireRequest {
    pub key: Option<String>,
    #[serde(default)]
    pub seconds: JsonValue,
}

/// Build a `{"error": ...}` response
fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

/// Build a `{"message": ...}` response
fn message_response(message: impl Into<String>) -> Response {
    (StatusCode::OK, Json(json!({ "message": message.into() }))).into_response()
}

fn snapshot_failure(e: SnapshotError) -> Response {
    error!("Snapshot write failed: {}", e);
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("Failed to persist change: {}", e),
    )
}

/// Read a seconds count from JSON input.
///
/// Accepts integers, floats (truncated) and numeric strings. `null` and
/// the empty string mean "not given". Anything else is rejected.
pub(crate) fn parse_seconds(raw: &JsonValue) -> Result<Option<i64>, ()> {
    match raw {
        JsonValue::Null => Ok(None),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => Ok(Some(i)),
            None => n.as_f64().map(|f| Some(f.trunc() as i64)).ok_or(()),
        },
        JsonValue::String(s) if s.trim().is_empty() => Ok(None),
        JsonValue::String(s) => s.trim().parse::<i64>().map(Some).map_err(|_| ()),
        _ => Err(()),
    }
}

/// `POST /put`
pub async fn put_handler(State(cache): State<AppState>, Json(req): Json<PutRequest>) -> Response {
    let key = match req.key {
        Some(key) if !key.is_empty() => key,
        _ => return error_response(StatusCode::BAD_REQUEST, "Key is required"),
    };

    let ttl = match parse_seconds(&req.ttl) {
        // Zero or negative means no expiration
        Ok(ttl) => ttl.filter(|t| *t > 0),
        Err(()) => return error_response(StatusCode::BAD_REQUEST, "TTL must be a number"),
    };

    debug!("PUT {} (ttl {:?})", key, ttl);

    match cache.put(&key, req.value, ttl) {
        Ok(()) => message_response("Data Stored Successfully"),
        Err(e) => snapshot_failure(e),
    }
}

/// `GET /get/:key`
pub async fn get_handler(State(cache): State<AppState>, Path(key): Path<String>) -> Response {
    match cache.get(&key) {
        Some(value) => (StatusCode::OK, Json(json!({ "value": value }))).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "Key not found or expired"),
    }
}

/// `DELETE /delete/:key`
pub async fn delete_handler(State(cache): State<AppState>, Path(key): Path<String>) -> Response {
    match cache.delete(&key) {
        Ok(Some(_)) => message_response("Key Deleted Successfully"),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "Key not found"),
        Err(e) => snapshot_failure(e),
    }
}

/// `GET /show`
pub async fn show_handler(State(cache): State<AppState>) -> Response {
    (StatusCode::OK, Json(cache.get_all())).into_response()
}

/// `POST /expire`
pub async fn expire_handler(State(cache): State<AppState>, Json(req): Json<ExpireRequest>) -> Response {
    let key = match req.key {
        Some(key) if !key.is_empty() => key,
        _ => return error_response(StatusCode::BAD_REQUEST, "Key and seconds are required"),
    };

    let seconds = match parse_seconds(&req.seconds) {
        Ok(Some(seconds)) => seconds,
        Ok(None) => return error_response(StatusCode::BAD_REQUEST, "Key and seconds are required"),
        Err(()) => return error_response(StatusCode::BAD_REQUEST, "Seconds must be a number"),
    };

    match cache.expire(&key, seconds) {
        Ok(true) => message_response(format!("Key will expire in {} seconds", seconds)),
        Ok(false) => error_response(StatusCode::NOT_FOUND, "Key not found"),
        Err(e) => snapshot_failure(e),
    }
}

/// `GET /ttl/:key`
pub async fn ttl_handler(State(cache): State<AppState>, Path(key): Path<String>) -> Response {
    let ttl = cache.ttl(&key);
    match ttl {
        Ttl::NotFound => error_response(StatusCode::NOT_FOUND, "Key not found or expired"),
        Ttl::NoExpiry => (
            StatusCode::OK,
            Json(json!({ "ttl": ttl.code(), "message": "Key has no expiration" })),
        )
            .into_response(),
        Ttl::Remaining(secs) => (
            StatusCode::OK,
            Json(json!({ "ttl": secs, "message": format!("{} seconds remaining", secs) })),
        )
            .into_response(),
    }
}

/// `POST /persist/:key`
pub async fn persist_handler(State(cache): State<AppState>, Path(key): Path<String>) -> Response {
    match cache.persist(&key) {
        Ok(true) => message_response("Key is now persistent (no expiration)"),
        Ok(false) => error_response(StatusCode::NOT_FOUND, "Key not found"),
        Err(e) => snapshot_failure(e),
    }
}

/// `GET /stats`
pub async fn stats_handler(State(cache): State<AppState>) -> Response {
    (StatusCode::OK, Json(cache.stats())).into_response()
}
