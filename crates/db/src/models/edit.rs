//! Rows of the `edits` table.

use editflow_core::edit_status::EditStatus;
use editflow_core::error::CoreError;
use editflow_core::job::EditRecord;
use editflow_core::types::{DbId, Timestamp, UserId};
use sqlx::FromRow;

/// A row from the `edits` table.
#[derive(Debug, Clone, FromRow)]
pub struct Edit {
    pub id: DbId,
    pub user_id: UserId,
    pub job_id: Option<DbId>,
    pub original_image_url: String,
    pub original_image_filename: String,
    pub edited_image_url: Option<String>,
    pub edited_image_filename: Option<String>,
    pub user_prompt_original: String,
    pub user_prompt_translated: Option<String>,
    pub image_description_ai: Option<String>,
    pub status: String,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TryFrom<Edit> for EditRecord {
    type Error = CoreError;

    fn try_from(row: Edit) -> Result<Self, Self::Error> {
        let status: EditStatus = row.status.parse()?;
        Ok(EditRecord {
            id: row.id,
            user_id: row.user_id,
            job_id: row.job_id,
            original_image_url: row.original_image_url,
            original_image_filename: row.original_image_filename,
            edited_image_url: row.edited_image_url,
            edited_image_filename: row.edited_image_filename,
            user_prompt_original: row.user_prompt_original,
            user_prompt_translated: row.user_prompt_translated,
            image_description_ai: row.image_description_ai,
            status,
            error_message: row.error_message,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Query parameters for `GET /api/v1/edits`.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct EditListQuery {
    /// Maximum number of results. Defaults to 20, capped at 100.
    pub limit: Option<i64>,
    /// Number of results to skip. Defaults to 0.
    pub offset: Option<i64>,
}
