//! Interval mode: one batch per tick until cancelled.

use std::time::Duration;

use editflow_pipeline::BatchRunner;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct PeriodicWorker {
    runner: BatchRunner,
    interval: Duration,
    batch_size: i64,
}

impl PeriodicWorker {
    pub fn new(runner: BatchRunner, interval: Duration, batch_size: i64) -> Self {
        Self {
            runner,
            interval,
            batch_size,
        }
    }

    /// Run batches until the cancellation token is triggered. A batch in
    /// flight is finished before the loop exits.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            batch_size = self.batch_size,
            "Periodic worker started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Periodic worker shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.runner.run_batch(self.batch_size).await {
                        tracing::error!(error = %e, "Batch failed to start");
                    }
                }
            }
        }
    }
}

/// Wait for a spawned worker task to end. Returns `false`, after logging,
/// when the task panicked or was aborted.
pub async fn wait_stopped(handle: JoinHandle<()>) -> bool {
    match handle.await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(error = %e, "Periodic worker task failed");
            false
        }
    }
}
