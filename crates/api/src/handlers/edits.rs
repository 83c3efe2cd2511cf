//! Handlers for the `/edits` resource.
//!
//! All endpoints require authentication via [`AuthUser`] and only ever see
//! the caller's own edits.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use editflow_core::error::CoreError;
use editflow_core::job::EditRecord;
use editflow_core::submission::SubmitEdit;
use editflow_core::types::DbId;
use editflow_db::models::edit::EditListQuery;
use editflow_db::repositories::EditRepo;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Identifiers returned on submission. Progress is polled via the job id.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedEdit {
    pub edit_id: DbId,
    pub job_id: DbId,
}

/// POST /api/v1/edits
///
/// Create an edit and its job in one transaction. Returns 201.
pub async fn submit_edit(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<SubmitEdit>,
) -> AppResult<impl IntoResponse> {
    let input = input.normalized()?;
    let (edit, job) = EditRepo::submit(&state.pool, &auth.user_id, &input).await?;

    tracing::info!(
        edit_id = %edit.id,
        job_id = %job.id,
        user_id = %auth.user_id,
        "Edit submitted",
    );

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: SubmittedEdit {
                edit_id: edit.id,
                job_id: job.id,
            },
        }),
    ))
}

/// GET /api/v1/edits/{id}
pub async fn get_edit(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(edit_id): Path<DbId>,
) -> AppResult<Json<DataResponse<EditRecord>>> {
    let edit = EditRepo::find_for_user(&state.pool, edit_id, &auth.user_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Edit",
            id: edit_id,
        }))?;

    Ok(Json(DataResponse {
        data: EditRecord::try_from(edit)?,
    }))
}

/// GET /api/v1/edits
///
/// The caller's edits, newest first. Supports `limit` and `offset`.
pub async fn list_edits(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<EditListQuery>,
) -> AppResult<Json<DataResponse<Vec<EditRecord>>>> {
    let edits = EditRepo::list_for_user(&state.pool, &auth.user_id, params.limit, params.offset)
        .await?
        .into_iter()
        .map(EditRecord::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(DataResponse { data: edits }))
}
