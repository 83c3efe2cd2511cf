//! One bounded pass over the eligible jobs.

use std::sync::Arc;

use editflow_core::types::DbId;
use serde::Serialize;

use editflow_capabilities::Capabilities;

use crate::config::PipelineConfig;
use crate::executor::StageExecutor;
use crate::store::{EligibleJob, JobStore, StoreError};

/// Message returned when nothing was eligible.
pub const NO_PENDING_JOBS: &str = "No pending jobs found";

/// Message returned after at least one job was looked at.
pub const JOBS_PROCESSED: &str = "Jobs processed";

/// What happened to one job in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// One step succeeded; the job waits for the next batch.
    StageAdvanced,
    /// The final upload succeeded.
    Completed,
    /// Retries are exhausted; the job is terminal.
    Failed,
    /// The step failed and will be retried, or a write failed and the job
    /// was left as it was.
    Error,
    /// Another worker claimed the job first.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOutcome {
    pub job_id: DbId,
    pub status: OutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobOutcome {
    pub fn new(job_id: DbId, status: OutcomeStatus) -> Self {
        Self {
            job_id,
            status,
            error: None,
        }
    }

    pub fn skipped(job_id: DbId) -> Self {
        Self::new(job_id, OutcomeStatus::Skipped)
    }

    pub fn failed(job_id: DbId, error: String) -> Self {
        Self {
            job_id,
            status: OutcomeStatus::Failed,
            error: Some(error),
        }
    }

    pub fn error(job_id: DbId, error: String) -> Self {
        Self {
            job_id,
            status: OutcomeStatus::Error,
            error: Some(error),
        }
    }

    /// Skipped jobs were never worked on and do not count as processed.
    pub fn counts_as_processed(&self) -> bool {
        self.status != OutcomeStatus::Skipped
    }
}

/// Response body of a batch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub message: String,
    pub processed: usize,
    pub results: Vec<JobOutcome>,
}

impl BatchSummary {
    pub fn empty() -> Self {
        Self {
            message: NO_PENDING_JOBS.to_string(),
            processed: 0,
            results: Vec::new(),
        }
    }

    pub fn from_outcomes(results: Vec<JobOutcome>) -> Self {
        Self {
            message: JOBS_PROCESSED.to_string(),
            processed: results.iter().filter(|r| r.counts_as_processed()).count(),
            results,
        }
    }

    pub fn count(&self, status: OutcomeStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }
}

/// Selects eligible jobs and runs them one after another.
///
/// Stateless between calls; everything it knows comes from the store.
pub struct BatchRunner {
    store: Arc<dyn JobStore>,
    executor: StageExecutor,
}

impl BatchRunner {
    pub fn new(store: Arc<dyn JobStore>, executor: StageExecutor) -> Self {
        Self { store, executor }
    }

    /// Runner whose executor shares `store`.
    pub fn with_store(
        store: Arc<dyn JobStore>,
        capabilities: Capabilities,
        config: PipelineConfig,
    ) -> Self {
        let executor = StageExecutor::new(Arc::clone(&store), capabilities, config);
        Self::new(store, executor)
    }

    /// Run up to `max_jobs` jobs, oldest first.
    ///
    /// Fails only when the eligible set cannot be read. Per-job failures are
    /// reported in the summary and never stop the rest of the batch.
    pub async fn run_batch(&self, max_jobs: i64) -> Result<BatchSummary, StoreError> {
        let max_retries = self.executor.retry_policy().max_retries;
        let jobs = self.store.list_eligible(max_retries, max_jobs).await?;

        if jobs.is_empty() {
            tracing::debug!("No pending jobs found");
            return Ok(BatchSummary::empty());
        }

        tracing::info!(count = jobs.len(), max_jobs, "Processing batch");

        let mut results = Vec::with_capacity(jobs.len());
        for job in &jobs {
            let outcome = match job {
                EligibleJob::Ready(job) => self.executor.run(job).await,
                EligibleJob::Unreadable(job) => self.executor.run_unreadable(job).await,
            };
            results.push(outcome);
        }

        let summary = BatchSummary::from_outcomes(results);
        tracing::info!(
            processed = summary.processed,
            advanced = summary.count(OutcomeStatus::StageAdvanced),
            completed = summary.count(OutcomeStatus::Completed),
            failed = summary.count(OutcomeStatus::Failed),
            errors = summary.count(OutcomeStatus::Error),
            skipped = summary.count(OutcomeStatus::Skipped),
            "Batch finished",
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn outcome_serializes_to_wire_shape() {
        let id = uuid::Uuid::nil();
        assert_eq!(
            serde_json::to_value(JobOutcome::new(id, OutcomeStatus::StageAdvanced)).unwrap(),
            json!({ "jobId": id, "status": "stage_advanced" })
        );
        assert_eq!(
            serde_json::to_value(JobOutcome::error(id, "boom".into())).unwrap(),
            json!({ "jobId": id, "status": "error", "error": "boom" })
        );
    }

    #[test]
    fn skipped_jobs_are_not_counted() {
        let id = uuid::Uuid::nil();
        let summary = BatchSummary::from_outcomes(vec![
            JobOutcome::new(id, OutcomeStatus::Completed),
            JobOutcome::skipped(id),
            JobOutcome::failed(id, "x".into()),
        ]);
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.message, JOBS_PROCESSED);
    }

    #[test]
    fn empty_summary_matches_no_jobs_response() {
        assert_eq!(
            serde_json::to_value(BatchSummary::empty()).unwrap(),
            json!({ "message": "No pending jobs found", "processed": 0, "results": [] })
        );
    }
}
