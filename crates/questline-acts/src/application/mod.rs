//! Orchestration over the pure domain: locking, persistence and queries.

pub mod driver;
pub mod locks;
pub mod query_handlers;
