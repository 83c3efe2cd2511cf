use std::sync::Arc;

use editflow_capabilities::{Capabilities, CapabilityConfig};
use editflow_pipeline::{BatchRunner, PgJobStore};
use editflow_worker::{logging, scheduler, PeriodicWorker, WorkerConfig};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    logging::init_tracing("editflow_worker=info,editflow_pipeline=info,editflow_capabilities=info");

    // --- Configuration ---
    let config = WorkerConfig::from_env();
    let capability_config = CapabilityConfig::from_env();
    tracing::info!(
        batch_size = config.pipeline.batch_size,
        max_retries = config.pipeline.max_retries,
        lease_secs = config.pipeline.lease_secs,
        "Loaded worker configuration",
    );

    // --- Database ---
    let pool = editflow_db::create_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");
    editflow_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database connection pool created");

    // --- Runner ---
    let capabilities = Capabilities::from_config(&capability_config).await;
    let store = Arc::new(PgJobStore::new(pool, config.pipeline.lease_secs));
    let runner = BatchRunner::with_store(store, capabilities, config.pipeline);

    match config.interval {
        None => {
            let summary = runner
                .run_batch(config.pipeline.batch_size)
                .await
                .expect("Batch failed to start");
            println!(
                "{}",
                serde_json::to_string_pretty(&summary).expect("Summary is serializable")
            );
        }
        Some(interval) => {
            let cancel = CancellationToken::new();
            let worker = PeriodicWorker::new(runner, interval, config.pipeline.batch_size);
            let handle = {
                let cancel = cancel.clone();
                tokio::spawn(async move { worker.run(cancel).await })
            };

            shutdown_signal().await;
            cancel.cancel();
            if scheduler::wait_stopped(handle).await {
                tracing::info!("Worker stopped");
            }
        }
    }
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl-C, shutting down"),
        () = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
