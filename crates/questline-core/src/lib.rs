//! Questline Core — shared domain types.
//!
//! Progress codes, conversation states, the code/state resolver, the error
//! taxonomy, and the progress store contract. No infrastructure code lives
//! here.

pub mod clock;
pub mod error;
pub mod progress;
pub mod repository;
pub mod resolver;
