use std::sync::Arc;

use server::config::Config;
use server::dispatcher::Dispatcher;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env();
    tracing::info!(
        queue_capacity = config.dispatch.queue_capacity,
        acquire_timeout_ms = config.dispatch.acquire_timeout.as_millis() as u64,
        "Dispatcher config loaded"
    );

    // Everything lives in memory: a restart loses queued jobs and batches.
    let dispatcher = Arc::new(Dispatcher::new(config.dispatch.clone()));
    let app = server::app(dispatcher);

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;

    Ok(())
}
