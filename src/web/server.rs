//! HTTP server implementation

use axum::{
    routing::{delete, get, post},
    Router,
};
use std::future::Future;
use tower_http::cors::CorsLayer;
use tracing::info;

use super::handlers::{
    delete_handler, expire_handler, get_handler, persist_handler, put_handler, show_handler,
    stats_handler, ttl_handler, AppState,
};

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/put", post(put_handler))
        .route("/get/:key", get(get_handler))
        .route("/delete/:key", delete(delete_handler))
        .route("/show", get(show_handler))
        .route("/expire", post(expire_handler))
        .route("/ttl/:key", get(ttl_handler))
        .route("/persist/:key", post(persist_handler))
        .route("/stats", get(stats_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Run the web server until `shutdown` completes
pub async fn run_web_server<F>(addr: &str, state: AppState, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = router(state);

    // Start the server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("HTTP interface available at http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("HTTP server stopped");
    Ok(())
}
