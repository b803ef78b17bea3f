//! Route modules.

pub mod conversation;
pub mod health;
pub mod users;
