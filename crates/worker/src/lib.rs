//! Batch worker for the edit orchestrator.
//!
//! The binary runs one batch per invocation (driven by an external
//! scheduler) or, when `WORKER_INTERVAL_SECS` is set, loops until shutdown.

pub mod config;
pub mod logging;
pub mod scheduler;

pub use config::WorkerConfig;
pub use scheduler::PeriodicWorker;
