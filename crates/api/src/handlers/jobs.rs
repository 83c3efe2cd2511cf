use axum::extract::{Path, State};
use axum::Json;
use editflow_core::job::JobStatusView;
use editflow_core::types::DbId;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

/// GET /api/v1/jobs/{id}/status
///
/// Progress of one of the caller's jobs. Jobs owned by someone else are
/// reported as not found.
pub async fn get_job_status(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<Json<JobStatusView>> {
    let view = state.reporter.get_status(job_id, &auth.user_id).await?;
    Ok(Json(view))
}
