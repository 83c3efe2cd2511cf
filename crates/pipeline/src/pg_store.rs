//! [`JobStore`] backed by Postgres through the `editflow-db` repositories.
//!
//! Each step write and its edit mirror share one transaction, so a poller
//! never sees a job that advanced while its edit did not.

use async_trait::async_trait;
use editflow_core::job::{EditRecord, JobRecord};
use editflow_core::retry::{RetryDecision, LEASE_EXPIRED_ERROR};
use editflow_core::stage::Stage;
use editflow_core::submission::SubmitEdit;
use editflow_core::types::DbId;
use editflow_db::models::job::{
    AdvanceJob, ClaimJob, FailJobStep, FailUnreadableJob, ImageProcessingJob,
};
use editflow_db::repositories::{EditRepo, JobRepo};
use editflow_db::DbPool;
use uuid::Uuid;

use crate::store::{
    ClaimRequest, EditMirror, EligibleJob, JobStore, StepFailure, StepSuccess, StoreError,
    UnreadableJob,
};

#[derive(Clone)]
pub struct PgJobStore {
    pool: DbPool,
    /// Lease renewal applied when a step keeps its lease.
    lease_secs: i64,
}

impl PgJobStore {
    pub fn new(pool: DbPool, lease_secs: i64) -> Self {
        Self { pool, lease_secs }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn list_eligible(
        &self,
        max_retries: i32,
        limit: i64,
    ) -> Result<Vec<EligibleJob>, StoreError> {
        let rows = JobRepo::list_eligible(&self.pool, max_retries, limit).await?;
        Ok(rows.into_iter().map(eligible).collect())
    }

    async fn claim(
        &self,
        observed: &JobRecord,
        request: &ClaimRequest,
    ) -> Result<Option<JobRecord>, StoreError> {
        if !observed.stage.can_transition_to(request.claimed_stage) {
            return Err(StoreError::IllegalTransition {
                job_id: observed.id,
                from: observed.stage,
                to: request.claimed_stage,
            });
        }

        let takeover = request.takeover(observed);
        let give_up = matches!(takeover, Some(RetryDecision::GiveUp { .. }));
        let claim = ClaimJob {
            job_id: observed.id,
            expected_stage: observed.stage,
            observed_lease: observed.lease_token,
            observed_retry_count: observed.retry_count,
            claimed_stage: if give_up { Stage::Failed } else { request.claimed_stage },
            lease_token: (!give_up).then_some(request.lease_token),
            lease_secs: request.lease_secs,
            max_retries: request.max_retries,
            retry_count: takeover.map_or(observed.retry_count, RetryDecision::retry_count),
            last_error: takeover.map(|_| LEASE_EXPIRED_ERROR.to_string()),
        };

        let mut tx = self.pool.begin().await?;
        let Some(row) = JobRepo::claim(&mut *tx, &claim).await? else {
            return Ok(None);
        };
        if give_up {
            EditRepo::fail(&mut *tx, row.edit_id, LEASE_EXPIRED_ERROR).await?;
        }
        tx.commit().await?;

        Ok(Some(JobRecord::try_from(row)?))
    }

    async fn complete_step(
        &self,
        job: &JobRecord,
        lease_token: Uuid,
        success: &StepSuccess,
    ) -> Result<JobRecord, StoreError> {
        if !job.stage.can_transition_to(success.next_stage) {
            return Err(StoreError::IllegalTransition {
                job_id: job.id,
                from: job.stage,
                to: success.next_stage,
            });
        }

        let mut tx = self.pool.begin().await?;

        let advance = AdvanceJob {
            job_id: job.id,
            lease_token,
            next_stage: success.next_stage,
            patch: success.patch.to_json(),
            renew_lease_secs: success.hold_lease.then_some(self.lease_secs),
        };
        let row = JobRepo::advance(&mut *tx, &advance)
            .await?
            .ok_or(StoreError::LeaseLost(job.id))?;

        EditRepo::mark_processing(&mut *tx, job.edit_id).await?;
        match &success.mirror {
            EditMirror::Nothing => {}
            EditMirror::Description(description) => {
                EditRepo::record_description(&mut *tx, job.edit_id, description).await?;
            }
            EditMirror::Translation(Some(translated)) => {
                EditRepo::record_translation(&mut *tx, job.edit_id, translated).await?;
            }
            EditMirror::Translation(None) => {}
            EditMirror::Completed { url, filename } => {
                EditRepo::complete(&mut *tx, job.edit_id, url, filename).await?;
            }
        }

        tx.commit().await?;
        Ok(JobRecord::try_from(row)?)
    }

    async fn record_failure(
        &self,
        job: &JobRecord,
        lease_token: Uuid,
        failure: &StepFailure,
    ) -> Result<JobRecord, StoreError> {
        if failure.retry_count < job.retry_count || !job.stage.can_transition_to(failure.stage) {
            return Err(StoreError::IllegalTransition {
                job_id: job.id,
                from: job.stage,
                to: failure.stage,
            });
        }

        let mut tx = self.pool.begin().await?;

        let input = FailJobStep {
            job_id: job.id,
            lease_token,
            stage: failure.stage,
            retry_count: failure.retry_count,
            error: failure.error.clone(),
        };
        let row = JobRepo::record_failure(&mut *tx, &input)
            .await?
            .ok_or(StoreError::LeaseLost(job.id))?;

        if failure.stage == Stage::Failed {
            EditRepo::fail(&mut *tx, job.edit_id, &failure.error).await?;
        }

        tx.commit().await?;
        Ok(JobRecord::try_from(row)?)
    }

    async fn record_unreadable(
        &self,
        job: &UnreadableJob,
        decision: RetryDecision,
    ) -> Result<bool, StoreError> {
        let give_up = matches!(decision, RetryDecision::GiveUp { .. });
        let input = FailUnreadableJob {
            job_id: job.id,
            observed_stage: job.stage.clone(),
            observed_lease: job.lease_token,
            observed_retry_count: job.retry_count,
            retry_count: decision.retry_count(),
            give_up,
            error: job.error.clone(),
        };

        let mut tx = self.pool.begin().await?;
        let Some(row) = JobRepo::record_unreadable(&mut *tx, &input).await? else {
            return Ok(false);
        };
        if give_up {
            EditRepo::fail(&mut *tx, row.edit_id, &job.error).await?;
        }
        tx.commit().await?;
        Ok(true)
    }

    async fn find_job(&self, id: DbId) -> Result<Option<JobRecord>, StoreError> {
        JobRepo::find_by_id(&self.pool, id)
            .await?
            .map(JobRecord::try_from)
            .transpose()
            .map_err(StoreError::from)
    }

    async fn find_job_for_user(
        &self,
        id: DbId,
        user_id: &str,
    ) -> Result<Option<JobRecord>, StoreError> {
        JobRepo::find_for_user(&self.pool, id, user_id)
            .await?
            .map(JobRecord::try_from)
            .transpose()
            .map_err(StoreError::from)
    }

    async fn find_edit(&self, id: DbId) -> Result<Option<EditRecord>, StoreError> {
        EditRepo::find_by_id(&self.pool, id)
            .await?
            .map(EditRecord::try_from)
            .transpose()
            .map_err(StoreError::from)
    }

    async fn submit(
        &self,
        user_id: &str,
        input: &SubmitEdit,
    ) -> Result<(EditRecord, JobRecord), StoreError> {
        let (edit, job) = EditRepo::submit(&self.pool, user_id, input).await?;
        Ok((EditRecord::try_from(edit)?, JobRecord::try_from(job)?))
    }
}

/// Parse one listed row, keeping what a claim needs when parsing fails.
fn eligible(row: ImageProcessingJob) -> EligibleJob {
    let (id, stage, retry_count, lease_token) = (
        row.id,
        row.current_stage.clone(),
        row.retry_count,
        row.lease_token,
    );
    match JobRecord::try_from(row) {
        Ok(job) => EligibleJob::Ready(job),
        Err(e) => EligibleJob::Unreadable(UnreadableJob {
            id,
            stage,
            retry_count,
            lease_token,
            error: e.to_string(),
        }),
    }
}
