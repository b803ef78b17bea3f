//! Questline — act state machine and conversation driver.
//!
//! Responsible for routing inbound events, stepping users through the acts,
//! and persisting progress and history as one unit per event.

pub mod application;
pub mod domain;
