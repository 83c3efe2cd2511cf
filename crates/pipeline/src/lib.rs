//! The edit orchestrator.
//!
//! [`BatchRunner`] selects eligible jobs from a [`JobStore`] and hands each
//! one to the [`StageExecutor`], which claims it, runs one step against the
//! injected capabilities, and persists the result. [`StatusReporter`] is the
//! read side used by pollers.

pub mod batch;
pub mod config;
pub mod executor;
pub mod memory;
pub mod pg_store;
pub mod status;
pub mod store;

pub use batch::{BatchRunner, BatchSummary, JobOutcome, OutcomeStatus};
pub use config::PipelineConfig;
pub use executor::{StageError, StageExecutor, StageFailureKind};
pub use memory::MemoryJobStore;
pub use pg_store::PgJobStore;
pub use status::{StatusError, StatusReporter};
pub use store::{
    ClaimRequest, EditMirror, EligibleJob, JobStore, StepFailure, StepSuccess, StoreError,
    UnreadableJob,
};
