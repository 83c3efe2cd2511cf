//! Domain types and pure orchestration logic for the edit pipeline.
//!
//! Nothing in this crate performs I/O. The stage machine, payload contracts
//! and retry policy live here so that the store, the executor and the API
//! all agree on one definition.

pub mod edit_status;
pub mod error;
pub mod job;
pub mod payload;
pub mod retry;
pub mod stage;
pub mod submission;
pub mod types;
