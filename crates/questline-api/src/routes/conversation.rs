//! Inbound chat events.

use std::sync::Arc;

use axum::extract::State;
use axum::{Json, Router, routing::post};
use questline_acts::application::driver::OutputSequence;
use questline_acts::domain::event::InboundEvent;
use questline_core::error::DomainError;
use serde::Serialize;
use tracing::{error, instrument};

use crate::error::ApiError;
use crate::state::AppState;

/// Response body for POST /events.
#[derive(Debug, Serialize)]
pub struct EventResponse {
    #[serde(flatten)]
    pub sequence: OutputSequence,
    /// Cumulative delivery offset of each output, in milliseconds.
    pub delivery_schedule_ms: Vec<u64>,
}

impl From<OutputSequence> for EventResponse {
    fn from(sequence: OutputSequence) -> Self {
        let delivery_schedule_ms = sequence
            .delivery_schedule()
            .iter()
            .map(|offset| u64::try_from(offset.as_millis()).unwrap_or(u64::MAX))
            .collect();
        Self {
            sequence,
            delivery_schedule_ms,
        }
    }
}

/// POST /events
///
/// The event is handled on its own task so that a client hanging up cannot
/// cancel a unit of work halfway through.
#[instrument(skip(state, event), fields(identity = %event.identity, kind = ?event.kind))]
async fn post_event(
    State(state): State<AppState>,
    Json(event): Json<InboundEvent>,
) -> Result<Json<EventResponse>, ApiError> {
    let driver = Arc::clone(&state.driver);
    let outcome = tokio::spawn(async move { driver.handle(&event).await })
        .await
        .map_err(|e| {
            error!(error = %e, "event task aborted");
            DomainError::Persistence(format!("event task aborted: {e}"))
        })?;

    match outcome {
        Ok(sequence) => Ok(Json(EventResponse::from(sequence))),
        Err(e @ DomainError::Validation(_)) => Err(ApiError::from(e)),
        Err(e) => Err(ApiError::with_reply(e, state.driver.failure_reply())),
    }
}

/// Returns the router for inbound events.
pub fn router() -> Router<AppState> {
    Router::new().route("/events", post(post_event))
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use questline_acts::application::driver::ConversationDriver;
    use questline_acts::domain::machine::ActStateMachine;
    use questline_acts::domain::script::QuestScript;
    use questline_core::progress::ProgressCode;
    use questline_core::repository::ProgressStore;
    use questline_test_support::{
        FailingProgressStore, FailureMode, FixedClock, InMemoryProgressStore,
    };
    use serde_json::Value;
    use tower::ServiceExt;

    fn app_state_with(store: Arc<dyn ProgressStore>) -> AppState {
        let machine = ActStateMachine::new(QuestScript::embedded().unwrap());
        AppState::new(ConversationDriver::new(
            machine,
            store,
            Arc::new(FixedClock::standard()),
        ))
    }

    fn event_request(body: &Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/events")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap()
    }

    async fn json_of(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_start_message_returns_greeting_and_schedule() {
        // Arrange
        let store = InMemoryProgressStore::new();
        let app = router().with_state(app_state_with(Arc::new(store.clone())));
        let body = serde_json::json!({
            "identity": "tg:100",
            "channel_id": 5,
            "message_id": 1,
            "kind": "message",
            "payload": "/start",
            "display_name": "Ada"
        });

        // Act
        let response = app.oneshot(event_request(&body)).await.unwrap();

        // Assert
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_of(response).await;
        assert_eq!(json["state"], "start");
        assert_eq!(json["progress_code"], "000");
        assert_eq!(json["committed"], true);
        assert_eq!(json["outputs"][0]["type"], "choice");
        assert_eq!(json["outputs"][0]["options"][0]["data"], "start_quest");
        assert_eq!(json["delivery_schedule_ms"].as_array().unwrap().len(), 1);
        assert_eq!(store.user_count(), 1);
    }

    #[tokio::test]
    async fn test_secret_advances_progress() {
        // Arrange
        let store = InMemoryProgressStore::new();
        store.seed_user("tg:101", ProgressCode::FirstAct, FixedClock::standard().0);
        let app = router().with_state(app_state_with(Arc::new(store.clone())));
        let body = serde_json::json!({
            "identity": "tg:101",
            "channel_id": 5,
            "message_id": 2,
            "kind": "message",
            "payload": "Lantern"
        });

        // Act
        let response = app.oneshot(event_request(&body)).await.unwrap();

        // Assert
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_of(response).await;
        assert_eq!(json["progress_code"], "110");
        assert_eq!(json["state"], "second_act");
        assert_eq!(
            store.user("tg:101").unwrap().progress_code,
            ProgressCode::SecondAct
        );
    }

    #[tokio::test]
    async fn test_blank_identity_returns_400() {
        let app = router().with_state(app_state_with(Arc::new(InMemoryProgressStore::new())));
        let body = serde_json::json!({
            "identity": " ",
            "channel_id": 5,
            "message_id": 1,
            "kind": "message",
            "payload": "/start"
        });

        let response = app.oneshot(event_request(&body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unreachable_store_returns_503_with_generic_reply() {
        // Arrange
        let app = router().with_state(app_state_with(Arc::new(FailingProgressStore)));
        let body = serde_json::json!({
            "identity": "tg:102",
            "channel_id": 5,
            "message_id": 1,
            "kind": "callback",
            "payload": "start_quest"
        });

        // Act
        let response = app.oneshot(event_request(&body)).await.unwrap();

        // Assert
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let json = json_of(response).await;
        assert_eq!(json["error"], "connection_error");
        assert!(json["reply"]["text"].is_string());
    }

    #[tokio::test]
    async fn test_failed_commit_returns_500_and_persists_nothing() {
        let store = InMemoryProgressStore::failing_with(FailureMode::Commit);
        let app = router().with_state(app_state_with(Arc::new(store.clone())));
        let body = serde_json::json!({
            "identity": "tg:103",
            "channel_id": 5,
            "message_id": 1,
            "kind": "message",
            "payload": "/start"
        });

        let response = app.oneshot(event_request(&body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(store.user_count(), 0);
        assert_eq!(store.history_len(), 0);
    }

    #[tokio::test]
    async fn test_unknown_event_kind_is_rejected() {
        let app = router().with_state(app_state_with(Arc::new(InMemoryProgressStore::new())));
        let body = serde_json::json!({
            "identity": "tg:104",
            "channel_id": 5,
            "message_id": 1,
            "kind": "sticker",
            "payload": ""
        });

        let response = app.oneshot(event_request(&body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
