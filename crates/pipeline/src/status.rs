//! Read-only progress queries.

use std::sync::Arc;

use editflow_core::job::JobStatusView;
use editflow_core::types::DbId;

use crate::store::{JobStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    /// Absent, or owned by someone else. The two are indistinguishable.
    #[error("Job {0} not found")]
    NotFound(DbId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone)]
pub struct StatusReporter {
    store: Arc<dyn JobStore>,
}

impl StatusReporter {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    pub async fn get_status(
        &self,
        job_id: DbId,
        requester: &str,
    ) -> Result<JobStatusView, StatusError> {
        self.store
            .find_job_for_user(job_id, requester)
            .await?
            .map(|job| JobStatusView::from(&job))
            .ok_or(StatusError::NotFound(job_id))
    }
}
