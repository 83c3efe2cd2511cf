//! Scheduler trigger.

use axum::extract::State;
use axum::Json;
use editflow_pipeline::BatchSummary;

use crate::error::AppResult;
use crate::middleware::auth::CronAuth;
use crate::state::AppState;

/// POST /api/v1/orchestrator/worker
///
/// Runs one batch and returns its summary. Per-job failures are reported in
/// `results`; only a store that cannot be queried yields a 5xx.
pub async fn run_worker(
    _cron: CronAuth,
    State(state): State<AppState>,
) -> AppResult<Json<BatchSummary>> {
    let summary = state
        .runner
        .run_batch(state.config.pipeline.batch_size)
        .await?;

    tracing::info!(processed = summary.processed, "Scheduler trigger handled");

    Ok(Json(summary))
}
