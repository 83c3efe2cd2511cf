//! Shared harness for orchestrator tests on the in-memory store.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use editflow_capabilities::fakes::FakeCapabilities;
use editflow_core::job::{EditRecord, JobRecord};
use editflow_core::payload::StagePayload;
use editflow_core::retry::RetryDecision;
use editflow_core::stage::Stage;
use editflow_core::submission::SubmitEdit;
use editflow_core::types::DbId;
use editflow_pipeline::{
    BatchRunner, ClaimRequest, EligibleJob, JobStore, MemoryJobStore, PipelineConfig,
    StageExecutor, StepFailure, StepSuccess, StoreError, UnreadableJob,
};
use tokio::sync::Barrier;
use uuid::Uuid;

pub const USER: &str = "user_1";
pub const ARABIC_PROMPT: &str = "اجعلها أكثر إشراقاً";

pub struct Harness {
    pub store: Arc<MemoryJobStore>,
    pub fakes: FakeCapabilities,
    pub runner: BatchRunner,
    pub config: PipelineConfig,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(MemoryJobStore::default());
        let fakes = FakeCapabilities::new();
        let config = PipelineConfig::default();
        let runner = runner_for(store.clone(), &fakes, config);
        Self {
            store,
            fakes,
            runner,
            config,
        }
    }

    /// `workers` runners over the same store whose listings all return
    /// before any of them claims.
    pub fn lockstep_runners(&self, workers: usize) -> Vec<BatchRunner> {
        let gated: Arc<dyn JobStore> = Arc::new(ListingBarrier {
            inner: self.store.clone(),
            barrier: Barrier::new(workers),
        });
        (0..workers)
            .map(|_| {
                BatchRunner::with_store(gated.clone(), self.fakes.capabilities(), self.config)
            })
            .collect()
    }

    pub fn executor(&self) -> StageExecutor {
        StageExecutor::new(self.store.clone(), self.fakes.capabilities(), self.config)
    }

    pub async fn submit(&self, prompt: &str) -> JobRecord {
        let input = SubmitEdit {
            original_image_url: "u1".into(),
            original_image_filename: "f1".into(),
            user_prompt: prompt.into(),
        };
        let (_, job) = self.store.submit(USER, &input).await.unwrap();
        job
    }

    /// Insert a job at an arbitrary stage with an arbitrary payload.
    pub fn insert(&self, stage: Stage, payload: StagePayload) -> JobRecord {
        let now = Utc::now();
        let job = JobRecord {
            id: uuid::Uuid::new_v4(),
            edit_id: uuid::Uuid::new_v4(),
            user_id: USER.into(),
            stage,
            payload,
            retry_count: 0,
            last_error: None,
            lease_token: None,
            lease_expires_at: None,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_job(job.clone());
        job
    }

    pub async fn job(&self, job: &JobRecord) -> JobRecord {
        self.store.find_job(job.id).await.unwrap().unwrap()
    }

    pub async fn run(&self) -> editflow_pipeline::BatchSummary {
        self.runner.run_batch(self.config.batch_size).await.unwrap()
    }
}

fn runner_for(
    store: Arc<MemoryJobStore>,
    fakes: &FakeCapabilities,
    config: PipelineConfig,
) -> BatchRunner {
    let executor = StageExecutor::new(store.clone(), fakes.capabilities(), config);
    BatchRunner::new(store, executor)
}

pub fn submitted_payload() -> StagePayload {
    StagePayload::submitted("u1", "f1", ARABIC_PROMPT)
}

pub fn described_payload() -> StagePayload {
    let mut payload = submitted_payload();
    payload.ai_image_description = Some("A cat on a red sofa.".into());
    payload
}

pub fn translated_payload() -> StagePayload {
    let mut payload = described_payload();
    payload.prompt_language = Some("ar".into());
    payload.translated_user_prompt = Some("Make it brighter".into());
    payload
}

/// Waits after every listing until all workers have listed.
struct ListingBarrier {
    inner: Arc<MemoryJobStore>,
    barrier: Barrier,
}

#[async_trait]
impl JobStore for ListingBarrier {
    async fn list_eligible(
        &self,
        max_retries: i32,
        limit: i64,
    ) -> Result<Vec<EligibleJob>, StoreError> {
        let jobs = self.inner.list_eligible(max_retries, limit).await;
        self.barrier.wait().await;
        jobs
    }

    async fn claim(
        &self,
        observed: &JobRecord,
        request: &ClaimRequest,
    ) -> Result<Option<JobRecord>, StoreError> {
        self.inner.claim(observed, request).await
    }

    async fn complete_step(
        &self,
        job: &JobRecord,
        lease_token: Uuid,
        success: &StepSuccess,
    ) -> Result<JobRecord, StoreError> {
        self.inner.complete_step(job, lease_token, success).await
    }

    async fn record_failure(
        &self,
        job: &JobRecord,
        lease_token: Uuid,
        failure: &StepFailure,
    ) -> Result<JobRecord, StoreError> {
        self.inner.record_failure(job, lease_token, failure).await
    }

    async fn record_unreadable(
        &self,
        job: &UnreadableJob,
        decision: RetryDecision,
    ) -> Result<bool, StoreError> {
        self.inner.record_unreadable(job, decision).await
    }

    async fn find_job(&self, id: DbId) -> Result<Option<JobRecord>, StoreError> {
        self.inner.find_job(id).await
    }

    async fn find_job_for_user(
        &self,
        id: DbId,
        user_id: &str,
    ) -> Result<Option<JobRecord>, StoreError> {
        self.inner.find_job_for_user(id, user_id).await
    }

    async fn find_edit(&self, id: DbId) -> Result<Option<EditRecord>, StoreError> {
        self.inner.find_edit(id).await
    }

    async fn submit(
        &self,
        user_id: &str,
        input: &SubmitEdit,
    ) -> Result<(EditRecord, JobRecord), StoreError> {
        self.inner.submit(user_id, input).await
    }
}
