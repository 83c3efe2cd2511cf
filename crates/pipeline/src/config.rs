use editflow_core::retry::{DEFAULT_BATCH_SIZE, DEFAULT_LEASE_SECS, DEFAULT_MAX_RETRIES};

/// Orchestrator tuning shared by the worker binary and the trigger endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Jobs selected per batch.
    pub batch_size: i64,
    /// Failed attempts before a job is marked `failed`.
    pub max_retries: i32,
    /// Lease duration for a claimed job, in seconds.
    pub lease_secs: i64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            lease_secs: DEFAULT_LEASE_SECS,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var             | Default |
    /// |---------------------|---------|
    /// | `WORKER_BATCH_SIZE` | `5`     |
    /// | `JOB_MAX_RETRIES`   | `3`     |
    /// | `JOB_LEASE_SECS`    | `300`   |
    pub fn from_env() -> Self {
        let batch_size: i64 = std::env::var("WORKER_BATCH_SIZE")
            .unwrap_or_else(|_| DEFAULT_BATCH_SIZE.to_string())
            .parse()
            .expect("WORKER_BATCH_SIZE must be a valid i64");

        let max_retries: i32 = std::env::var("JOB_MAX_RETRIES")
            .unwrap_or_else(|_| DEFAULT_MAX_RETRIES.to_string())
            .parse()
            .expect("JOB_MAX_RETRIES must be a valid i32");

        let lease_secs: i64 = std::env::var("JOB_LEASE_SECS")
            .unwrap_or_else(|_| DEFAULT_LEASE_SECS.to_string())
            .parse()
            .expect("JOB_LEASE_SECS must be a valid i64");

        assert!(batch_size > 0, "WORKER_BATCH_SIZE must be positive");
        assert!(max_retries > 0, "JOB_MAX_RETRIES must be positive");
        assert!(lease_secs > 0, "JOB_LEASE_SECS must be positive");

        Self {
            batch_size,
            max_retries,
            lease_secs,
        }
    }
}
