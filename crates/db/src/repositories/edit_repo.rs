//! Repository for the `edits` table.
//!
//! Status writes are guarded in SQL so that a status never moves backwards:
//! `processing` only replaces `pending`, and the terminal statuses only
//! replace non-terminal ones.

use editflow_core::payload::StagePayload;
use editflow_core::submission::SubmitEdit;
use editflow_core::types::DbId;
use sqlx::{PgExecutor, PgPool};

use crate::models::edit::Edit;
use crate::models::job::ImageProcessingJob;
use crate::repositories::JobRepo;

/// Column list for `edits` queries.
const COLUMNS: &str = "\
    id, user_id, job_id, original_image_url, original_image_filename, \
    edited_image_url, edited_image_filename, user_prompt_original, \
    user_prompt_translated, image_description_ai, status, error_message, \
    created_at, updated_at";

/// Maximum page size for edit listing.
const MAX_LIMIT: i64 = 100;

/// Default page size for edit listing.
const DEFAULT_LIMIT: i64 = 20;

/// Provides CRUD operations for edits.
pub struct EditRepo;

impl EditRepo {
    /// Create an edit and its job in one transaction.
    ///
    /// The job starts at `pending_describe` with the submitted fields as its
    /// payload; the edit is linked back to the job before commit.
    pub async fn submit(
        pool: &PgPool,
        user_id: &str,
        input: &SubmitEdit,
    ) -> Result<(Edit, ImageProcessingJob), sqlx::Error> {
        let mut tx = pool.begin().await?;

        let insert_query = format!(
            "INSERT INTO edits (user_id, original_image_url, original_image_filename, user_prompt_original) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        let edit = sqlx::query_as::<_, Edit>(&insert_query)
            .bind(user_id)
            .bind(&input.original_image_url)
            .bind(&input.original_image_filename)
            .bind(&input.user_prompt)
            .fetch_one(&mut *tx)
            .await?;

        let payload: StagePayload = input.initial_payload();
        let job = JobRepo::create(&mut *tx, edit.id, user_id, &payload).await?;

        let link_query = format!("UPDATE edits SET job_id = $2 WHERE id = $1 RETURNING {COLUMNS}");
        let edit = sqlx::query_as::<_, Edit>(&link_query)
            .bind(edit.id)
            .bind(job.id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok((edit, job))
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Edit>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM edits WHERE id = $1");
        sqlx::query_as::<_, Edit>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find an edit only if it belongs to `user_id`.
    pub async fn find_for_user(
        pool: &PgPool,
        id: DbId,
        user_id: &str,
    ) -> Result<Option<Edit>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM edits WHERE id = $1 AND user_id = $2");
        sqlx::query_as::<_, Edit>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// List a user's edits, newest first.
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: &str,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<Edit>, sqlx::Error> {
        let limit = limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let offset = offset.unwrap_or(0).max(0);
        let query = format!(
            "SELECT {COLUMNS} FROM edits WHERE user_id = $1 \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, Edit>(&query)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Move `pending` to `processing`. No-op for any other status.
    pub async fn mark_processing<'e>(
        executor: impl PgExecutor<'e>,
        id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE edits SET status = 'processing' WHERE id = $1 AND status = 'pending'")
                .bind(id)
                .execute(executor)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn record_description<'e>(
        executor: impl PgExecutor<'e>,
        id: DbId,
        description: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE edits SET image_description_ai = $2 \
             WHERE id = $1 AND status IN ('pending', 'processing')",
        )
        .bind(id)
        .bind(description)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn record_translation<'e>(
        executor: impl PgExecutor<'e>,
        id: DbId,
        translated_prompt: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE edits SET user_prompt_translated = $2 \
             WHERE id = $1 AND status IN ('pending', 'processing')",
        )
        .bind(id)
        .bind(translated_prompt)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Record the uploaded result and mark the edit completed.
    pub async fn complete<'e>(
        executor: impl PgExecutor<'e>,
        id: DbId,
        edited_image_url: &str,
        edited_image_filename: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE edits \
             SET status = 'completed', edited_image_url = $2, edited_image_filename = $3 \
             WHERE id = $1 AND status IN ('pending', 'processing')",
        )
        .bind(id)
        .bind(edited_image_url)
        .bind(edited_image_filename)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark the edit failed with the job's last error.
    pub async fn fail<'e>(
        executor: impl PgExecutor<'e>,
        id: DbId,
        error_message: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE edits SET status = 'failed', error_message = $2 \
             WHERE id = $1 AND status IN ('pending', 'processing')",
        )
        .bind(id)
        .bind(error_message)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
