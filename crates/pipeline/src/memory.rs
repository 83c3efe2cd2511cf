//! In-memory [`JobStore`] with the same claim and lease semantics as the
//! Postgres store. Used by tests and for running the pipeline without a
//! database.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use editflow_core::edit_status::EditStatus;
use editflow_core::job::{EditRecord, JobRecord};
use editflow_core::retry::{RetryDecision, LEASE_EXPIRED_ERROR};
use editflow_core::stage::Stage;
use editflow_core::submission::SubmitEdit;
use editflow_core::types::{DbId, Timestamp};
use uuid::Uuid;

use crate::store::{
    ClaimRequest, EditMirror, EligibleJob, JobStore, StepFailure, StepSuccess, StoreError,
    UnreadableJob,
};

#[derive(Default)]
struct State {
    jobs: HashMap<DbId, JobRecord>,
    edits: HashMap<DbId, EditRecord>,
    /// Job ids in creation order.
    order: Vec<DbId>,
}

pub struct MemoryJobStore {
    state: Mutex<State>,
    lease_secs: i64,
}

impl MemoryJobStore {
    pub fn new(lease_secs: i64) -> Self {
        Self {
            state: Mutex::new(State::default()),
            lease_secs,
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert a job (and a matching pending edit) exactly as given.
    pub fn insert_job(&self, job: JobRecord) -> EditRecord {
        let now = Utc::now();
        let edit = EditRecord {
            id: job.edit_id,
            user_id: job.user_id.clone(),
            job_id: Some(job.id),
            original_image_url: job.payload.original_image_url.clone().unwrap_or_default(),
            original_image_filename: job
                .payload
                .original_image_filename
                .clone()
                .unwrap_or_default(),
            edited_image_url: None,
            edited_image_filename: None,
            user_prompt_original: job.payload.user_prompt.clone().unwrap_or_default(),
            user_prompt_translated: None,
            image_description_ai: None,
            status: EditStatus::Pending,
            error_message: None,
            created_at: now,
            updated_at: now,
        };
        let mut state = self.lock();
        state.order.push(job.id);
        state.edits.insert(edit.id, edit.clone());
        state.jobs.insert(job.id, job);
        edit
    }

    /// Push a held lease into the past, as if its worker died.
    pub fn expire_lease(&self, job_id: DbId) {
        if let Some(job) = self.lock().jobs.get_mut(&job_id) {
            if job.lease_token.is_some() {
                job.lease_expires_at = Some(Utc::now() - Duration::seconds(1));
            }
        }
    }

    /// Snapshot of every job, in creation order.
    pub fn jobs(&self) -> Vec<JobRecord> {
        let state = self.lock();
        state
            .order
            .iter()
            .filter_map(|id| state.jobs.get(id).cloned())
            .collect()
    }
}

impl Default for MemoryJobStore {
    fn default() -> Self {
        Self::new(editflow_core::retry::DEFAULT_LEASE_SECS)
    }
}

/// Lease-checked mutable access to a job.
fn held<'a>(
    state: &'a mut State,
    job_id: DbId,
    lease_token: Uuid,
) -> Result<&'a mut JobRecord, StoreError> {
    match state.jobs.get_mut(&job_id) {
        Some(job) if job.lease_token == Some(lease_token) => Ok(job),
        _ => Err(StoreError::LeaseLost(job_id)),
    }
}

fn set_edit_status(edit: &mut EditRecord, next: EditStatus) -> bool {
    if edit.status.can_transition_to(next) {
        edit.status = next;
        true
    } else {
        false
    }
}

fn fail_edit(state: &mut State, edit_id: DbId, error: &str, now: Timestamp) {
    if let Some(edit) = state.edits.get_mut(&edit_id) {
        if set_edit_status(edit, EditStatus::Failed) {
            edit.error_message = Some(error.to_owned());
            edit.updated_at = now;
        }
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn list_eligible(
        &self,
        max_retries: i32,
        limit: i64,
    ) -> Result<Vec<EligibleJob>, StoreError> {
        let now = Utc::now();
        let state = self.lock();
        Ok(state
            .order
            .iter()
            .filter_map(|id| state.jobs.get(id))
            .filter(|job| {
                !job.stage.is_terminal()
                    && job.retry_count < max_retries
                    && job.lease_available(now)
            })
            .take(usize::try_from(limit).unwrap_or(0))
            .map(|job| EligibleJob::Ready(job.clone()))
            .collect())
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

        let now = Utc::now();
        let mut state = self.lock();
        let Some(job) = state.jobs.get_mut(&observed.id) else {
            return Ok(None);
        };
        if job.stage != observed.stage
            || job.lease_token != observed.lease_token
            || job.retry_count != observed.retry_count
            || !job.lease_available(now)
            || job.retry_count >= request.max_retries
        {
            return Ok(None);
        }

        let takeover = request.takeover(observed);
        if let Some(decision) = takeover {
            job.retry_count = decision.retry_count();
            job.last_error = Some(LEASE_EXPIRED_ERROR.to_string());
        }
        job.updated_at = now;
        if let Some(RetryDecision::GiveUp { .. }) = takeover {
            job.stage = Stage::Failed;
            job.lease_token = None;
            job.lease_expires_at = None;
            let claimed = job.clone();
            fail_edit(&mut state, claimed.edit_id, LEASE_EXPIRED_ERROR, now);
            return Ok(Some(claimed));
        }

        job.stage = request.claimed_stage;
        job.lease_token = Some(request.lease_token);
        job.lease_expires_at = Some(now + Duration::seconds(request.lease_secs));
        Ok(Some(job.clone()))
    }

    async fn complete_step(
        &self,
        job: &JobRecord,
        lease_token: Uuid,
        success: &StepSuccess,
    ) -> Result<JobRecord, StoreError> {
        let now = Utc::now();
        let mut state = self.lock();

        let stored = held(&mut state, job.id, lease_token)?;
        if !stored.stage.can_transition_to(success.next_stage) {
            return Err(StoreError::IllegalTransition {
                job_id: job.id,
                from: stored.stage,
                to: success.next_stage,
            });
        }
        stored.stage = success.next_stage;
        stored.payload.merge(&success.patch);
        if success.hold_lease {
            stored.lease_expires_at = Some(now + Duration::seconds(self.lease_secs));
        } else {
            stored.lease_token = None;
            stored.lease_expires_at = None;
        }
        stored.updated_at = now;
        let updated = stored.clone();

        if let Some(edit) = state.edits.get_mut(&updated.edit_id) {
            set_edit_status(edit, EditStatus::Processing);
            if !edit.status.is_terminal() {
                match &success.mirror {
                    EditMirror::Nothing | EditMirror::Translation(None) => {}
                    EditMirror::Description(description) => {
                        edit.image_description_ai = Some(description.clone());
                    }
                    EditMirror::Translation(Some(translated)) => {
                        edit.user_prompt_translated = Some(translated.clone());
                    }
                    EditMirror::Completed { url, filename } => {
                        if set_edit_status(edit, EditStatus::Completed) {
                            edit.edited_image_url = Some(url.clone());
                            edit.edited_image_filename = Some(filename.clone());
                        }
                    }
                }
            }
            edit.updated_at = now;
        }

        Ok(updated)
    }

    async fn record_failure(
        &self,
        job: &JobRecord,
        lease_token: Uuid,
        failure: &StepFailure,
    ) -> Result<JobRecord, StoreError> {
        let now = Utc::now();
        let mut state = self.lock();

        let stored = held(&mut state, job.id, lease_token)?;
        if failure.retry_count < stored.retry_count
            || !stored.stage.can_transition_to(failure.stage)
        {
            return Err(StoreError::IllegalTransition {
                job_id: job.id,
                from: stored.stage,
                to: failure.stage,
            });
        }
        stored.stage = failure.stage;
        stored.retry_count = failure.retry_count;
        stored.last_error = Some(failure.error.clone());
        stored.lease_token = None;
        stored.lease_expires_at = None;
        stored.updated_at = now;
        let updated = stored.clone();

        if failure.stage == Stage::Failed {
            fail_edit(&mut state, updated.edit_id, &failure.error, now);
        }

        Ok(updated)
    }

    async fn record_unreadable(
        &self,
        job: &UnreadableJob,
        decision: RetryDecision,
    ) -> Result<bool, StoreError> {
        let now = Utc::now();
        let mut state = self.lock();
        let Some(stored) = state.jobs.get_mut(&job.id) else {
            return Ok(false);
        };
        if stored.stage.as_str() != job.stage
            || stored.retry_count != job.retry_count
            || stored.lease_token != job.lease_token
            || !stored.lease_available(now)
        {
            return Ok(false);
        }

        let give_up = matches!(decision, RetryDecision::GiveUp { .. });
        if give_up {
            stored.stage = Stage::Failed;
        }
        stored.retry_count = decision.retry_count();
        stored.last_error = Some(job.error.clone());
        stored.lease_token = None;
        stored.lease_expires_at = None;
        stored.updated_at = now;
        let edit_id = stored.edit_id;

        if give_up {
            fail_edit(&mut state, edit_id, &job.error, now);
        }
        Ok(true)
    }

    async fn find_job(&self, id: DbId) -> Result<Option<JobRecord>, StoreError> {
        Ok(self.lock().jobs.get(&id).cloned())
    }

    async fn find_job_for_user(
        &self,
        id: DbId,
        user_id: &str,
    ) -> Result<Option<JobRecord>, StoreError> {
        Ok(self
            .lock()
            .jobs
            .get(&id)
            .filter(|job| job.user_id == user_id)
            .cloned())
    }

    async fn find_edit(&self, id: DbId) -> Result<Option<EditRecord>, StoreError> {
        Ok(self.lock().edits.get(&id).cloned())
    }

    async fn submit(
        &self,
        user_id: &str,
        input: &SubmitEdit,
    ) -> Result<(EditRecord, JobRecord), StoreError> {
        let now = Utc::now();
        let job = JobRecord {
            id: Uuid::new_v4(),
            edit_id: Uuid::new_v4(),
            user_id: user_id.to_owned(),
            stage: Stage::PendingDescribe,
            payload: input.initial_payload(),
            retry_count: 0,
            last_error: None,
            lease_token: None,
            lease_expires_at: None,
            created_at: now,
            updated_at: now,
        };
        let edit = self.insert_job(job.clone());
        Ok((edit, job))
    }
}
