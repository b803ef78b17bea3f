//! Shared application state.

use std::sync::Arc;

use questline_acts::application::driver::ConversationDriver;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// The conversation driver; owns the store, clock and identity locks.
    pub driver: Arc<ConversationDriver>,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(driver: ConversationDriver) -> Self {
        Self {
            driver: Arc::new(driver),
        }
    }
}
