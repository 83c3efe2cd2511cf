pub mod edits;
pub mod health;
pub mod jobs;
pub mod orchestrator;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /orchestrator/worker          POST  scheduler trigger (cron secret)
/// /jobs/{id}/status             GET   job progress
/// /edits                        POST  submit, GET list
/// /edits/{id}                   GET   one edit
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/orchestrator", orchestrator::router())
        .nest("/jobs", jobs::router())
        .nest("/edits", edits::router())
}
