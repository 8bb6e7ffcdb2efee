//! Analysis worker binary
//!
//! Runs `WORKER_CONCURRENCY` pull loops against the dispatcher, one engine
//! process each, until SIGINT/SIGTERM.

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use analysis_worker::{DispatcherClient, Worker, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Load .env file for local dev
    let _ = dotenvy::dotenv();

    let config = WorkerConfig::from_env()?;
    info!(
        dispatcher = %config.dispatcher_url,
        engine = %config.engine_path,
        concurrency = config.concurrency,
        "Worker config loaded"
    );

    let client = DispatcherClient::new(&config.dispatcher_url, config.http_timeout)?;
    let cancel = CancellationToken::new();

    let mut workers = JoinSet::new();
    for id in 0..config.concurrency {
        let worker = Worker::new(id, client.clone(), config.clone());
        let cancel = cancel.clone();
        workers.spawn(async move { worker.run(cancel).await });
    }

    tokio::spawn(shutdown_signal(cancel.clone()));

    let mut failures = 0usize;
    while let Some(joined) = workers.join_next().await {
        match joined {
            Ok(Ok(summary)) => info!(
                analyzed = summary.analyzed,
                failed = summary.failed,
                undelivered = summary.undelivered,
                "Worker finished"
            ),
            Ok(Err(e)) => {
                error!(error = %e, "Worker exited with error");
                failures += 1;
            }
            Err(e) => {
                error!(error = %e, "Worker task panicked");
                failures += 1;
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{failures} worker(s) stopped on error");
    }
    info!("Graceful shutdown complete");
    Ok(())
}

/// Cancel all workers on Ctrl-C or SIGTERM.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown requested, finishing in-flight jobs...");
    cancel.cancel();
}
