//! Questline — `PostgreSQL` persistence.
//!
//! Each event is one transaction: user row, progress code and history row
//! are written together or not at all.

pub mod pg_progress_store;

pub use pg_progress_store::PgProgressStore;
