//! Rows of the `image_processing_jobs` table.

use editflow_core::error::CoreError;
use editflow_core::job::JobRecord;
use editflow_core::payload::StagePayload;
use editflow_core::stage::Stage;
use editflow_core::types::{DbId, Timestamp, UserId};
use sqlx::FromRow;

/// A row from the `image_processing_jobs` table.
#[derive(Debug, Clone, FromRow)]
pub struct ImageProcessingJob {
    pub id: DbId,
    pub edit_id: DbId,
    pub user_id: UserId,
    pub current_stage: String,
    pub stage_payload: serde_json::Value,
    pub retry_count: i32,
    pub last_error: Option<String>,
    pub lease_token: Option<uuid::Uuid>,
    pub lease_expires_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TryFrom<ImageProcessingJob> for JobRecord {
    type Error = CoreError;

    fn try_from(row: ImageProcessingJob) -> Result<Self, Self::Error> {
        let stage: Stage = row.current_stage.parse()?;
        let payload = StagePayload::from_json(&row.stage_payload).map_err(|e| {
            CoreError::Internal(format!("Job {} has an unreadable stage_payload: {e}", row.id))
        })?;
        Ok(JobRecord {
            id: row.id,
            edit_id: row.edit_id,
            user_id: row.user_id,
            stage,
            payload,
            retry_count: row.retry_count,
            last_error: row.last_error,
            lease_token: row.lease_token,
            lease_expires_at: row.lease_expires_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Conditional update that takes ownership of a job for one step.
#[derive(Debug, Clone)]
pub struct ClaimJob {
    pub job_id: DbId,
    /// Stage the caller observed when it selected the job.
    pub expected_stage: Stage,
    /// Lease token the caller observed (`None` for a free lease).
    pub observed_lease: Option<uuid::Uuid>,
    /// Retry count the caller observed.
    pub observed_retry_count: i32,
    /// Stage written by the claim: the in-progress stage, or `failed` when
    /// taking over an expired lease exhausts the retries.
    pub claimed_stage: Stage,
    /// `None` writes no lease, for a claim that fails the job.
    pub lease_token: Option<uuid::Uuid>,
    pub lease_secs: i64,
    pub max_retries: i32,
    pub retry_count: i32,
    /// Replaces `last_error` when set.
    pub last_error: Option<String>,
}

/// Failed read of a listed row, counted like a failed step. Matched on the
/// raw columns the caller observed, since the row cannot be parsed.
#[derive(Debug, Clone)]
pub struct FailUnreadableJob {
    pub job_id: DbId,
    pub observed_stage: String,
    pub observed_lease: Option<uuid::Uuid>,
    pub observed_retry_count: i32,
    pub retry_count: i32,
    /// Move to `failed` instead of keeping the current stage.
    pub give_up: bool,
    pub error: String,
}

/// Successful step result, written by the lease holder.
#[derive(Debug, Clone)]
pub struct AdvanceJob {
    pub job_id: DbId,
    pub lease_token: uuid::Uuid,
    pub next_stage: Stage,
    /// Keys merged into `stage_payload`.
    pub patch: serde_json::Value,
    /// Keep the lease and push its expiry out by this many seconds. `None`
    /// releases the lease.
    pub renew_lease_secs: Option<i64>,
}

/// Failed step result, written by the lease holder. The lease is released.
#[derive(Debug, Clone)]
pub struct FailJobStep {
    pub job_id: DbId,
    pub lease_token: uuid::Uuid,
    /// Pending stage of the failed step, or `failed` at the ceiling.
    pub stage: Stage,
    pub retry_count: i32,
    pub error: String,
}
