use anyhow::Context;
use cinderkv::{web, Cache, Config};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    // RUST_LOG wins over the configured level
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!("CinderKV starting...");

    if let Err(e) = run(config).await {
        error!("Fatal: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    let cache: Arc<Cache<Value>> = Arc::new(Cache::open(&config)?);

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received");
    };

    web::run_web_server(&config.listen_addr, Arc::clone(&cache), shutdown)
        .await
        .context("HTTP server error")?;

    cache
        .shutdown()
        .await
        .context("Failed to flush snapshot on shutdown")?;

    info!("CinderKV stopped");
    Ok(())
}
