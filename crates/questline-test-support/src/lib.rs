//! Shared test doubles for the Questline engine.

mod clock;
mod store;

pub use clock::FixedClock;
pub use store::{FailingProgressStore, FailureMode, InMemoryProgressStore};
