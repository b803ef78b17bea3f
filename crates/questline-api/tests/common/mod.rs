//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use questline_acts::application::driver::ConversationDriver;
use questline_acts::domain::machine::ActStateMachine;
use questline_acts::domain::script::QuestScript;
use questline_core::repository::ProgressStore;
use questline_store::PgProgressStore;
use questline_test_support::{FixedClock, InMemoryProgressStore};
use sqlx::PgPool;
use tower::ServiceExt;

use questline_api::state::AppState;

/// Build the full app router over `store` with a fixed clock. Uses the same
/// route structure as `main.rs`.
pub fn build_app_with(store: Arc<dyn ProgressStore>) -> Router {
    let driver = ConversationDriver::new(
        ActStateMachine::new(QuestScript::embedded().unwrap()),
        store,
        Arc::new(FixedClock::standard()),
    );
    questline_api::app(AppState::new(driver))
}

/// Build the full app router over an in-memory store.
pub fn build_memory_app(store: &InMemoryProgressStore) -> Router {
    build_app_with(Arc::new(store.clone()))
}

/// Build the full app router over a real `PgProgressStore`.
pub fn build_pg_app(pool: PgPool) -> Router {
    build_app_with(Arc::new(PgProgressStore::new(pool)))
}

/// JSON body of an inbound event.
pub fn event(identity: &str, message_id: i64, kind: &str, payload: &str) -> serde_json::Value {
    serde_json::json!({
        "identity": identity,
        "channel_id": 1,
        "message_id": message_id,
        "kind": kind,
        "payload": payload,
        "display_name": "Ada"
    })
}

/// Send a request and return the status and JSON body (`Null` when empty).
pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if body_bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body_bytes).unwrap()
    };

    (status, json)
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();

    send(app, request).await
}

/// Send a body-less request and return the response.
pub async fn call(app: Router, method: &str, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    send(app, request).await
}
