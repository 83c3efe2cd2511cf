use std::time::Duration;

use editflow_pipeline::PipelineConfig;

/// Worker configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    pub pipeline: PipelineConfig,
    /// Delay between batches. `None` runs a single batch and exits.
    pub interval: Option<Duration>,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                 |
    /// |------------------------|-------------------------|
    /// | `DATABASE_URL`         | *(required)*            |
    /// | `WORKER_INTERVAL_SECS` | *(unset: run once)*     |
    ///
    /// Batch size, retry ceiling and lease length come from
    /// [`PipelineConfig::from_env`].
    pub fn from_env() -> Self {
        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let interval = std::env::var("WORKER_INTERVAL_SECS")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(|s| {
                let secs: u64 = s
                    .trim()
                    .parse()
                    .expect("WORKER_INTERVAL_SECS must be a valid u64");
                assert!(secs > 0, "WORKER_INTERVAL_SECS must be positive");
                Duration::from_secs(secs)
            });

        Self {
            database_url,
            pipeline: PipelineConfig::from_env(),
            interval,
        }
    }
}
