use axum::routing::get;
use axum::Router;

use crate::handlers::edits;
use crate::state::AppState;

/// Routes mounted at `/edits`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(edits::list_edits).post(edits::submit_edit))
        .route("/{id}", get(edits::get_edit))
}
