//! Repository for the `image_processing_jobs` table.
//!
//! Every write after a claim is conditioned on the claimant's lease token.
//! A write that matches no row means the lease was lost; callers see `None`
//! and must not assume the job moved.

use editflow_core::payload::StagePayload;
use editflow_core::stage::{Stage, TERMINAL_STAGES};
use editflow_core::types::DbId;
use sqlx::{PgExecutor, PgPool};

use crate::models::job::{
    AdvanceJob, ClaimJob, FailJobStep, FailUnreadableJob, ImageProcessingJob,
};

/// Column list for `image_processing_jobs` queries.
const COLUMNS: &str = "\
    id, edit_id, user_id, current_stage, stage_payload, retry_count, last_error, \
    lease_token, lease_expires_at, created_at, updated_at";

/// Provides the job operations the orchestrator needs.
pub struct JobRepo;

impl JobRepo {
    /// Insert a job at `pending_describe` for a freshly created edit.
    pub async fn create<'e>(
        executor: impl PgExecutor<'e>,
        edit_id: DbId,
        user_id: &str,
        payload: &StagePayload,
    ) -> Result<ImageProcessingJob, sqlx::Error> {
        let query = format!(
            "INSERT INTO image_processing_jobs (edit_id, user_id, current_stage, stage_payload) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ImageProcessingJob>(&query)
            .bind(edit_id)
            .bind(user_id)
            .bind(Stage::PendingDescribe.as_str())
            .bind(payload.to_json())
            .fetch_one(executor)
            .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<ImageProcessingJob>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM image_processing_jobs WHERE id = $1");
        sqlx::query_as::<_, ImageProcessingJob>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a job only if it belongs to `user_id`.
    pub async fn find_for_user(
        pool: &PgPool,
        id: DbId,
        user_id: &str,
    ) -> Result<Option<ImageProcessingJob>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM image_processing_jobs WHERE id = $1 AND user_id = $2"
        );
        sqlx::query_as::<_, ImageProcessingJob>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Jobs a worker may try to claim, oldest first.
    ///
    /// Eligible means non-terminal, below the retry ceiling, and with a free
    /// or expired lease. Selection does not lock anything; [`Self::claim`]
    /// decides the winner.
    pub async fn list_eligible(
        pool: &PgPool,
        max_retries: i32,
        limit: i64,
    ) -> Result<Vec<ImageProcessingJob>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM image_processing_jobs \
             WHERE current_stage <> ALL($1) \
               AND retry_count < $2 \
               AND (lease_token IS NULL OR lease_expires_at < NOW()) \
             ORDER BY created_at ASC, id ASC \
             LIMIT $3"
        );
        sqlx::query_as::<_, ImageProcessingJob>(&query)
            .bind(TERMINAL_STAGES.map(Stage::as_str).to_vec())
            .bind(max_retries)
            .bind(limit.max(0))
            .fetch_all(pool)
            .await
    }

    /// Atomically claim a job for one step.
    ///
    /// Matches the observed stage, lease token and retry count, a free or
    /// expired lease and a retry count below the ceiling. Exactly one
    /// concurrent caller gets the row back; everyone else gets `None`.
    pub async fn claim<'e>(
        executor: impl PgExecutor<'e>,
        input: &ClaimJob,
    ) -> Result<Option<ImageProcessingJob>, sqlx::Error> {
        let query = format!(
            "UPDATE image_processing_jobs \
             SET current_stage = $3, \
                 lease_token = $4, \
                 lease_expires_at = CASE WHEN $4::UUID IS NULL THEN NULL \
                     ELSE NOW() + make_interval(secs => $5::DOUBLE PRECISION) END, \
                 retry_count = $9, \
                 last_error = COALESCE($10, last_error) \
             WHERE id = $1 \
               AND current_stage = $2 \
               AND retry_count < $6 \
               AND lease_token IS NOT DISTINCT FROM $7 \
               AND retry_count = $8 \
               AND (lease_token IS NULL OR lease_expires_at < NOW()) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ImageProcessingJob>(&query)
            .bind(input.job_id)
            .bind(input.expected_stage.as_str())
            .bind(input.claimed_stage.as_str())
            .bind(input.lease_token)
            .bind(input.lease_secs as f64)
            .bind(input.max_retries)
            .bind(input.observed_lease)
            .bind(input.observed_retry_count)
            .bind(input.retry_count)
            .bind(input.last_error.as_deref())
            .fetch_optional(executor)
            .await
    }

    /// Count a row that could not be parsed as a failed attempt.
    ///
    /// Matches the raw columns the caller listed, under the same lease rules
    /// as [`Self::claim`]. The stage is kept unless `give_up` is set.
    pub async fn record_unreadable<'e>(
        executor: impl PgExecutor<'e>,
        input: &FailUnreadableJob,
    ) -> Result<Option<ImageProcessingJob>, sqlx::Error> {
        let query = format!(
            "UPDATE image_processing_jobs \
             SET current_stage = CASE WHEN $5 THEN $6 ELSE current_stage END, \
                 retry_count = $7, last_error = $8, \
                 lease_token = NULL, lease_expires_at = NULL \
             WHERE id = $1 \
               AND current_stage = $2 \
               AND retry_count = $3 \
               AND lease_token IS NOT DISTINCT FROM $4 \
               AND (lease_token IS NULL OR lease_expires_at < NOW()) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ImageProcessingJob>(&query)
            .bind(input.job_id)
            .bind(&input.observed_stage)
            .bind(input.observed_retry_count)
            .bind(input.observed_lease)
            .bind(input.give_up)
            .bind(Stage::Failed.as_str())
            .bind(input.retry_count)
            .bind(&input.error)
            .fetch_optional(executor)
            .await
    }

    /// Write the next stage and merge the step's patch into the payload.
    pub async fn advance<'e>(
        executor: impl PgExecutor<'e>,
        input: &AdvanceJob,
    ) -> Result<Option<ImageProcessingJob>, sqlx::Error> {
        let query = format!(
            "UPDATE image_processing_jobs \
             SET current_stage = $3, \
                 stage_payload = stage_payload || $4, \
                 lease_token = CASE WHEN $5::DOUBLE PRECISION IS NULL THEN NULL ELSE lease_token END, \
                 lease_expires_at = CASE WHEN $5::DOUBLE PRECISION IS NULL THEN NULL \
                     ELSE NOW() + make_interval(secs => $5::DOUBLE PRECISION) END \
             WHERE id = $1 AND lease_token = $2 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ImageProcessingJob>(&query)
            .bind(input.job_id)
            .bind(input.lease_token)
            .bind(input.next_stage.as_str())
            .bind(&input.patch)
            .bind(input.renew_lease_secs.map(|secs| secs as f64))
            .fetch_optional(executor)
            .await
    }

    /// Persist a failed step: new stage, retry count and error, lease released.
    pub async fn record_failure<'e>(
        executor: impl PgExecutor<'e>,
        input: &FailJobStep,
    ) -> Result<Option<ImageProcessingJob>, sqlx::Error> {
        let query = format!(
            "UPDATE image_processing_jobs \
             SET current_stage = $3, retry_count = $4, last_error = $5, \
                 lease_token = NULL, lease_expires_at = NULL \
             WHERE id = $1 AND lease_token = $2 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ImageProcessingJob>(&query)
            .bind(input.job_id)
            .bind(input.lease_token)
            .bind(input.stage.as_str())
            .bind(input.retry_count)
            .bind(&input.error)
            .fetch_optional(executor)
            .await
    }
}
