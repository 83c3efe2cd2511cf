//! The persistence seam of the orchestrator.
//!
//! Writes after a claim carry the claimant's lease token. A store must reject
//! them with [`StoreError::LeaseLost`] when the token no longer matches, so a
//! worker whose lease expired and was taken over cannot overwrite the new
//! owner's progress.

use async_trait::async_trait;
use editflow_core::error::CoreError;
use editflow_core::job::{EditRecord, JobRecord};
use editflow_core::payload::StagePayload;
use editflow_core::retry::{RetryDecision, RetryPolicy};
use editflow_core::stage::Stage;
use editflow_core::submission::SubmitEdit;
use editflow_core::types::DbId;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Lease on job {0} was lost")]
    LeaseLost(DbId),

    #[error("Invalid job record: {0}")]
    Corrupt(#[from] CoreError),

    #[error("Illegal stage transition for job {job_id}: {from} -> {to}")]
    IllegalTransition { job_id: DbId, from: Stage, to: Stage },
}

/// A row selected by [`JobStore::list_eligible`].
#[derive(Debug, Clone)]
pub enum EligibleJob {
    Ready(JobRecord),
    /// The row could not be read into a [`JobRecord`]. It still counts
    /// against the retry ceiling.
    Unreadable(UnreadableJob),
}

/// The columns of an unreadable row needed to claim it, plus the reason it
/// could not be read.
#[derive(Debug, Clone)]
pub struct UnreadableJob {
    pub id: DbId,
    /// Raw `current_stage` column.
    pub stage: String,
    pub retry_count: i32,
    pub lease_token: Option<Uuid>,
    pub error: String,
}

/// Parameters of an atomic claim.
#[derive(Debug, Clone, Copy)]
pub struct ClaimRequest {
    pub claimed_stage: Stage,
    pub lease_token: Uuid,
    pub lease_secs: i64,
    pub max_retries: i32,
}

impl ClaimRequest {
    /// Retry bookkeeping for a claim on `observed`. Taking over an expired
    /// lease counts the previous holder's attempt as a failure; a free lease
    /// costs nothing.
    pub fn takeover(&self, observed: &JobRecord) -> Option<RetryDecision> {
        observed
            .lease_token
            .map(|_| RetryPolicy::new(self.max_retries).on_failure(observed.retry_count))
    }
}

/// Visible results copied onto the edit when a step succeeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditMirror {
    Nothing,
    Description(String),
    /// `None` when the prompt needed no translation.
    Translation(Option<String>),
    Completed { url: String, filename: String },
}

/// A successful step, as persisted by the lease holder.
#[derive(Debug, Clone)]
pub struct StepSuccess {
    pub next_stage: Stage,
    pub patch: StagePayload,
    pub mirror: EditMirror,
    /// Keep the lease (renewed) because the next step runs immediately.
    pub hold_lease: bool,
}

/// A failed step. `stage` is the pending stage of the step, or `failed`
/// when the retry ceiling was reached.
#[derive(Debug, Clone)]
pub struct StepFailure {
    pub stage: Stage,
    pub retry_count: i32,
    pub error: String,
}

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Non-terminal jobs below the ceiling with a free or expired lease,
    /// oldest first. Selection does not claim.
    /// Rows that cannot be read are returned as [`EligibleJob::Unreadable`]
    /// so the rest of the batch still runs.
    async fn list_eligible(
        &self,
        max_retries: i32,
        limit: i64,
    ) -> Result<Vec<EligibleJob>, StoreError>;

    /// Claim `observed` if it is still exactly as observed. `Ok(None)` means
    /// another caller won or the job is no longer eligible.
    ///
    /// Taking over an expired lease raises the retry count and records
    /// [`LEASE_EXPIRED_ERROR`](editflow_core::retry::LEASE_EXPIRED_ERROR).
    /// When that reaches the ceiling the job comes back at `failed` with no
    /// lease, and its edit is failed too.
    async fn claim(
        &self,
        observed: &JobRecord,
        request: &ClaimRequest,
    ) -> Result<Option<JobRecord>, StoreError>;

    /// Persist a successful step and its edit mirror atomically.
    async fn complete_step(
        &self,
        job: &JobRecord,
        lease_token: Uuid,
        success: &StepSuccess,
    ) -> Result<JobRecord, StoreError>;

    /// Persist a failed step and release the lease. Reaching `failed` also
    /// fails the edit with the same error.
    async fn record_failure(
        &self,
        job: &JobRecord,
        lease_token: Uuid,
        failure: &StepFailure,
    ) -> Result<JobRecord, StoreError>;

    /// Count a failed read of `job` as a failed attempt, under the same
    /// conditions as a claim. `GiveUp` moves the job to `failed` and fails
    /// its edit. Returns `false` when the row changed since it was listed.
    async fn record_unreadable(
        &self,
        job: &UnreadableJob,
        decision: RetryDecision,
    ) -> Result<bool, StoreError>;

    async fn find_job(&self, id: DbId) -> Result<Option<JobRecord>, StoreError>;

    async fn find_job_for_user(
        &self,
        id: DbId,
        user_id: &str,
    ) -> Result<Option<JobRecord>, StoreError>;

    async fn find_edit(&self, id: DbId) -> Result<Option<EditRecord>, StoreError>;

    /// Create an edit and its job at `pending_describe`, atomically.
    async fn submit(
        &self,
        user_id: &str,
        input: &SubmitEdit,
    ) -> Result<(EditRecord, JobRecord), StoreError>;
}
