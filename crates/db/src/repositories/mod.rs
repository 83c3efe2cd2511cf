//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods. Reads
//! take `&PgPool`; writes that participate in a step transaction are generic
//! over [`sqlx::PgExecutor`] so callers can pass either the pool or a
//! transaction.

pub mod edit_repo;
pub mod job_repo;

pub use edit_repo::EditRepo;
pub use job_repo::JobRepo;
