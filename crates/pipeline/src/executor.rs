//! Runs one pipeline step for one job.
//!
//! The executor claims the job, extracts the step's typed input, calls the
//! capability and persists the outcome under the lease it obtained. The
//! edit step is followed by the upload in the same run: the edited image is
//! persisted at `uploading_result` first, with the lease held, so a crash
//! between the two resumes at the upload.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use editflow_capabilities::{BlobDestination, Capabilities, CapabilityError, ImageBlob};
use editflow_core::job::JobRecord;
use editflow_core::payload::{
    DescribeInput, DescribePatch, EditInput, EditPatch, MissingField, TranslateInput,
    TranslatePatch, UploadInput, UploadPatch,
};
use editflow_core::retry::{RetryDecision, RetryPolicy, LEASE_EXPIRED_ERROR};
use editflow_core::stage::{Stage, Step};
use uuid::Uuid;

use crate::batch::{JobOutcome, OutcomeStatus};
use crate::config::PipelineConfig;
use crate::store::{
    ClaimRequest, EditMirror, JobStore, StepFailure, StepSuccess, StoreError, UnreadableJob,
};

// ---------------------------------------------------------------------------
// Step errors
// ---------------------------------------------------------------------------

/// Why a step failed. Both kinds count against the same retry ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageFailureKind {
    /// The payload lacked what the step needs. No capability was called.
    Structural,
    /// A capability call failed or timed out.
    Capability,
}

#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error(transparent)]
    MissingField(#[from] MissingField),

    #[error("invalid {field}: {reason}")]
    InvalidPayload { field: &'static str, reason: String },

    #[error("Failed to {action}: {source}")]
    Capability {
        action: &'static str,
        #[source]
        source: CapabilityError,
    },
}

impl StageError {
    pub fn kind(&self) -> StageFailureKind {
        match self {
            StageError::MissingField(_) | StageError::InvalidPayload { .. } => {
                StageFailureKind::Structural
            }
            StageError::Capability { .. } => StageFailureKind::Capability,
        }
    }
}

/// Attach the failed action to a capability error.
fn capability(action: &'static str) -> impl FnOnce(CapabilityError) -> StageError {
    move |source| StageError::Capability { action, source }
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

pub struct StageExecutor {
    store: Arc<dyn JobStore>,
    capabilities: Capabilities,
    retry: RetryPolicy,
    lease_secs: i64,
}

impl StageExecutor {
    pub fn new(store: Arc<dyn JobStore>, capabilities: Capabilities, config: PipelineConfig) -> Self {
        Self {
            store,
            capabilities,
            retry: RetryPolicy::new(config.max_retries),
            lease_secs: config.lease_secs,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Advance `observed` by one step (two for edit followed by upload).
    ///
    /// Never returns an error: every failure becomes either persisted job
    /// state or an `error` outcome that leaves the job for the next batch.
    pub async fn run(&self, observed: &JobRecord) -> JobOutcome {
        let Some(step) = observed.stage.step() else {
            return JobOutcome::skipped(observed.id);
        };

        let request = ClaimRequest {
            claimed_stage: step.in_progress_stage(),
            lease_token: Uuid::new_v4(),
            lease_secs: self.lease_secs,
            max_retries: self.retry.max_retries,
        };
        let job = match self.store.claim(observed, &request).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                tracing::debug!(job_id = %observed.id, stage = %observed.stage, "Job already claimed, skipping");
                return JobOutcome::skipped(observed.id);
            }
            Err(e) => {
                tracing::error!(job_id = %observed.id, error = %e, "Failed to claim job");
                return JobOutcome::error(observed.id, e.to_string());
            }
        };
        let lease = request.lease_token;

        if job.stage == Stage::Failed {
            tracing::error!(
                job_id = %job.id,
                retry_count = job.retry_count,
                "Lease expired on the last attempt, job failed",
            );
            let error = job
                .last_error
                .unwrap_or_else(|| LEASE_EXPIRED_ERROR.to_string());
            return JobOutcome::failed(job.id, error);
        }
        if observed.lease_token.is_some() {
            tracing::warn!(
                job_id = %job.id,
                retry_count = job.retry_count,
                "Took over an expired lease",
            );
        }

        tracing::info!(
            job_id = %job.id,
            stage = %job.stage,
            retry_count = job.retry_count,
            "Claimed job",
        );

        match step {
            Step::Edit => self.run_edit_then_upload(job, lease).await,
            step => self.run_step(step, job, lease).await,
        }
    }

    /// Count a row that could not be read as a failed attempt, so it
    /// reaches `failed` at the ceiling instead of blocking every batch.
    pub async fn run_unreadable(&self, job: &UnreadableJob) -> JobOutcome {
        let decision = self.retry.on_failure(job.retry_count);
        tracing::warn!(
            job_id = %job.id,
            stage = %job.stage,
            retry_count = decision.retry_count(),
            error = %job.error,
            "Job record is unreadable",
        );

        match self.store.record_unreadable(job, decision).await {
            Ok(true) => match decision {
                RetryDecision::GiveUp { .. } => {
                    tracing::error!(job_id = %job.id, error = %job.error, "Retries exhausted, job failed");
                    JobOutcome::failed(job.id, job.error.clone())
                }
                RetryDecision::Retry { .. } => JobOutcome::error(job.id, job.error.clone()),
            },
            Ok(false) => {
                tracing::debug!(job_id = %job.id, "Unreadable job changed since listing, skipping");
                JobOutcome::skipped(job.id)
            }
            Err(e) => {
                tracing::error!(job_id = %job.id, error = %e, "Failed to record unreadable job");
                JobOutcome::error(job.id, format!("{}; additionally: {e}", job.error))
            }
        }
    }

    async fn run_edit_then_upload(&self, job: JobRecord, lease: Uuid) -> JobOutcome {
        let success = match self.edit(&job).await {
            Ok(success) => success,
            Err(e) => return self.fail(Step::Edit, &job, lease, e).await,
        };
        match self.store.complete_step(&job, lease, &success).await {
            Ok(edited) => {
                tracing::info!(job_id = %edited.id, stage = %edited.stage, "Edited image persisted, uploading");
                self.run_step(Step::Upload, edited, lease).await
            }
            Err(e) => self.persistence_error(&job, e),
        }
    }

    async fn run_step(&self, step: Step, job: JobRecord, lease: Uuid) -> JobOutcome {
        let result = match step {
            Step::Describe => self.describe(&job).await,
            Step::Translate => self.translate(&job).await,
            Step::Edit => self.edit(&job).await,
            Step::Upload => self.upload(&job).await,
        };
        let success = match result {
            Ok(success) => success,
            Err(e) => return self.fail(step, &job, lease, e).await,
        };

        match self.store.complete_step(&job, lease, &success).await {
            Ok(updated) if updated.stage == Stage::Completed => {
                tracing::info!(job_id = %updated.id, "Job completed");
                JobOutcome::new(updated.id, OutcomeStatus::Completed)
            }
            Ok(updated) => {
                tracing::info!(job_id = %updated.id, step = %step, stage = %updated.stage, "Stage advanced");
                JobOutcome::new(updated.id, OutcomeStatus::StageAdvanced)
            }
            Err(e) => self.persistence_error(&job, e),
        }
    }

    /// Record a failed step: release to the step's pending stage, or fail
    /// the job at the ceiling.
    async fn fail(&self, step: Step, job: &JobRecord, lease: Uuid, error: StageError) -> JobOutcome {
        let message = error.to_string();
        let decision = self.retry.on_failure(job.retry_count);
        let stage = match decision {
            RetryDecision::Retry { .. } => step.pending_stage(),
            RetryDecision::GiveUp { .. } => Stage::Failed,
        };
        let failure = StepFailure {
            stage,
            retry_count: decision.retry_count(),
            error: message.clone(),
        };

        tracing::warn!(
            job_id = %job.id,
            step = %step,
            kind = ?error.kind(),
            retry_count = failure.retry_count,
            error = %message,
            "Stage failed",
        );

        match self.store.record_failure(job, lease, &failure).await {
            Ok(_) if stage == Stage::Failed => {
                tracing::error!(job_id = %job.id, error = %message, "Retries exhausted, job failed");
                JobOutcome::failed(job.id, message)
            }
            Ok(_) => JobOutcome::error(job.id, message),
            Err(e) => {
                tracing::error!(job_id = %job.id, error = %e, "Failed to record stage failure");
                JobOutcome::error(job.id, format!("{message}; additionally: {e}"))
            }
        }
    }

    fn persistence_error(&self, job: &JobRecord, error: StoreError) -> JobOutcome {
        tracing::error!(job_id = %job.id, stage = %job.stage, error = %error, "Failed to persist stage result");
        JobOutcome::error(job.id, error.to_string())
    }

    // -----------------------------------------------------------------------
    // Steps
    // -----------------------------------------------------------------------

    async fn download(&self, url: &str) -> Result<ImageBlob, StageError> {
        self.capabilities
            .reader
            .download_blob(url)
            .await
            .map_err(capability("download image"))
    }

    async fn describe(&self, job: &JobRecord) -> Result<StepSuccess, StageError> {
        let input = DescribeInput::from_payload(&job.payload)?;
        let image = self.download(&input.image_url).await?;
        let description = self
            .capabilities
            .vision
            .describe_image(&image)
            .await
            .map_err(capability("describe image"))?;

        Ok(StepSuccess {
            next_stage: Step::Describe.next_stage(),
            patch: DescribePatch {
                ai_image_description: description.clone(),
            }
            .into(),
            mirror: EditMirror::Description(description),
            hold_lease: false,
        })
    }

    async fn translate(&self, job: &JobRecord) -> Result<StepSuccess, StageError> {
        let input = TranslateInput::from_payload(&job.payload)?;
        let translation = self
            .capabilities
            .translator
            .detect_language_and_translate(&input.user_prompt)
            .await
            .map_err(capability("translate prompt"))?;

        let patch = TranslatePatch::new(
            translation.language,
            translation.translated_text.clone(),
            &input.user_prompt,
        );
        Ok(StepSuccess {
            next_stage: Step::Translate.next_stage(),
            patch: patch.into(),
            mirror: EditMirror::Translation(translation.translated_text),
            hold_lease: false,
        })
    }

    async fn edit(&self, job: &JobRecord) -> Result<StepSuccess, StageError> {
        let input = EditInput::from_payload(&job.payload)?;
        let source = self.download(&input.image_url).await?;
        let edited = self
            .capabilities
            .editor
            .edit_image(&source, &input.description, &input.instructions)
            .await
            .map_err(capability("edit image"))?;

        Ok(StepSuccess {
            next_stage: Step::Edit.next_stage(),
            patch: EditPatch {
                edited_image_encoding: STANDARD.encode(&edited.bytes),
                edited_image_mime_type: edited.mime_type,
            }
            .into(),
            mirror: EditMirror::Nothing,
            hold_lease: true,
        })
    }

    async fn upload(&self, job: &JobRecord) -> Result<StepSuccess, StageError> {
        let input = UploadInput::from_payload(&job.payload)?;
        let bytes = STANDARD
            .decode(&input.encoding)
            .map_err(|e| StageError::InvalidPayload {
                field: "editedImageEncoding",
                reason: e.to_string(),
            })?;

        let destination = BlobDestination {
            user_id: job.user_id.clone(),
            filename: input.filename,
        };
        let stored = self
            .capabilities
            .storage
            .upload_blob(&ImageBlob::new(bytes, input.mime_type), &destination)
            .await
            .map_err(capability("upload edited image"))?;

        Ok(StepSuccess {
            next_stage: Step::Upload.next_stage(),
            patch: UploadPatch {
                edited_image_url: stored.public_url.clone(),
                edited_image_filename: stored.filename.clone(),
            }
            .into(),
            mirror: EditMirror::Completed {
                url: stored.public_url,
                filename: stored.filename,
            },
            hold_lease: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use editflow_core::payload::PayloadField;

    #[test]
    fn missing_field_is_structural_with_exact_message() {
        let err = StageError::from(MissingField(PayloadField::OriginalImageUrl));
        assert_eq!(err.kind(), StageFailureKind::Structural);
        assert_eq!(err.to_string(), "missing required field: originalImageUrl");
    }

    #[test]
    fn capability_error_names_the_action() {
        let err = capability("describe image")(CapabilityError::EmptyResponse("Gemini"));
        assert_eq!(err.kind(), StageFailureKind::Capability);
        assert_eq!(err.to_string(), "Failed to describe image: Empty response from Gemini");
    }
}
