//! Parsed job and edit records shared by the store implementations.

use serde::Serialize;

use crate::edit_status::EditStatus;
use crate::payload::StagePayload;
use crate::stage::Stage;
use crate::types::{DbId, Timestamp, UserId};

/// Execution state of one edit, as the orchestrator sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRecord {
    pub id: DbId,
    pub edit_id: DbId,
    pub user_id: UserId,
    pub stage: Stage,
    pub payload: StagePayload,
    pub retry_count: i32,
    pub last_error: Option<String>,
    /// Token of the worker currently holding the job, if any.
    pub lease_token: Option<uuid::Uuid>,
    pub lease_expires_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl JobRecord {
    /// Whether the lease is free or has lapsed at `now`.
    pub fn lease_available(&self, now: Timestamp) -> bool {
        match (self.lease_token, self.lease_expires_at) {
            (None, _) => true,
            (Some(_), Some(expires_at)) => expires_at < now,
            (Some(_), None) => false,
        }
    }
}

/// The user-facing record of one editing request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditRecord {
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
    pub status: EditStatus,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Read-only view served to pollers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusView {
    pub status: Stage,
    pub stage_payload: serde_json::Value,
    pub retry_count: i32,
    pub last_error: Option<String>,
    pub updated_at: Timestamp,
}

impl From<&JobRecord> for JobStatusView {
    fn from(job: &JobRecord) -> Self {
        Self {
            status: job.stage,
            stage_payload: job.payload.to_json(),
            retry_count: job.retry_count,
            last_error: job.last_error.clone(),
            updated_at: job.updated_at,
        }
    }
}
