use std::sync::Arc;

use editflow_pipeline::{BatchRunner, JobStore, PgJobStore, StatusReporter};

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: editflow_db::DbPool,
    pub config: Arc<ServerConfig>,
    /// Runs one batch per scheduler trigger.
    pub runner: Arc<BatchRunner>,
    /// Read side for job pollers.
    pub reporter: StatusReporter,
}

impl AppState {
    /// Wire the Postgres-backed store, the batch runner and the status
    /// reporter around `pool`.
    pub fn new(
        pool: editflow_db::DbPool,
        config: ServerConfig,
        capabilities: editflow_capabilities::Capabilities,
    ) -> Self {
        let store: Arc<dyn JobStore> =
            Arc::new(PgJobStore::new(pool.clone(), config.pipeline.lease_secs));
        let runner = BatchRunner::with_store(Arc::clone(&store), capabilities, config.pipeline);

        Self {
            pool,
            config: Arc::new(config),
            runner: Arc::new(runner),
            reporter: StatusReporter::new(store),
        }
    }
}
