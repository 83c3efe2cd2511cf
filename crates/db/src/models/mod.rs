//! Row structs and write DTOs.
//!
//! Each submodule contains a `FromRow` struct matching the table row, a
//! conversion into the parsed core record, and the inputs its repository
//! accepts for writes.

pub mod edit;
pub mod job;
