//! Questline — HTTP transport.
//!
//! Exposes the conversation driver and the user administration operations
//! over JSON. A chat adapter posts inbound events and delivers the returned
//! outputs according to their pause hints.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Builds the full application router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::health::router())
        .nest(
            "/api/v1",
            Router::new()
                .merge(routes::conversation::router())
                .merge(routes::users::router()),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
