use axum::routing::post;
use axum::Router;

use crate::handlers::orchestrator;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/worker", post(orchestrator::run_worker))
}
