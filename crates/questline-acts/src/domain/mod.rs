//! Pure quest logic: script, routing, state machine and outputs.

pub mod event;
pub mod machine;
pub mod output;
pub mod script;
