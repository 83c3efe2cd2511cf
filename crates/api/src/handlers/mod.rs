pub mod edits;
pub mod jobs;
pub mod orchestrator;
