//! Web interface module
//!
//! Thin HTTP adapter over the [`crate::cache::Cache`]: routing, JSON
//! bodies, input validation and status codes. No cache logic lives here.

mod handlers;
mod server;

pub use handlers::{AppState, ExpireRequest, PutRequest};
pub use server::{router, run_web_server};
