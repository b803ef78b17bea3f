//! User administration: progress, history, reset and deletion.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Json, Router, routing::get, routing::post};
use questline_acts::application::query_handlers::{self, ProgressView};
use questline_core::error::DomainError;
use questline_core::repository::{HistoryEntry, UserIdentity};
use tracing::{info, instrument};

use crate::error::ApiError;
use crate::state::AppState;

/// GET /users/{identity}
#[instrument(skip(state))]
async fn get_progress(
    State(state): State<AppState>,
    Path(identity): Path<String>,
) -> Result<Json<ProgressView>, ApiError> {
    let identity = UserIdentity::parse(identity)?;
    let view = query_handlers::get_progress(&identity, state.driver.store()).await?;
    Ok(Json(view))
}

/// GET /users/{identity}/history
#[instrument(skip(state))]
async fn get_history(
    State(state): State<AppState>,
    Path(identity): Path<String>,
) -> Result<Json<Vec<HistoryEntry>>, ApiError> {
    let identity = UserIdentity::parse(identity)?;
    let history = query_handlers::get_history(&identity, state.driver.store()).await?;
    Ok(Json(history))
}

/// POST /users/{identity}/reset
#[instrument(skip(state))]
async fn reset_progress(
    State(state): State<AppState>,
    Path(identity): Path<String>,
) -> Result<Json<ProgressView>, ApiError> {
    let identity = UserIdentity::parse(identity)?;
    let user = state.driver.reset(&identity).await?;
    info!(%identity, "admin reset");
    Ok(Json(ProgressView::from(user)))
}

/// DELETE /users/{identity}
#[instrument(skip(state))]
async fn delete_user(
    State(state): State<AppState>,
    Path(identity): Path<String>,
) -> Result<StatusCode, ApiError> {
    let identity = UserIdentity::parse(identity)?;
    if state.driver.delete(&identity).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(DomainError::NotFound(identity.to_string()).into())
    }
}

/// Returns the router for user administration.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users/{identity}", get(get_progress).delete(delete_user))
        .route("/users/{identity}/history", get(get_history))
        .route("/users/{identity}/reset", post(reset_progress))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::Request;
    use questline_acts::application::driver::ConversationDriver;
    use questline_acts::domain::machine::ActStateMachine;
    use questline_acts::domain::script::QuestScript;
    use questline_core::progress::ProgressCode;
    use questline_core::repository::ProgressStore;
    use questline_test_support::{FailingProgressStore, FixedClock, InMemoryProgressStore};
    use serde_json::Value;
    use tower::ServiceExt;

    fn app_state_with(store: Arc<dyn ProgressStore>) -> AppState {
        AppState::new(ConversationDriver::new(
            ActStateMachine::new(QuestScript::embedded().unwrap()),
            store,
            Arc::new(FixedClock::standard()),
        ))
    }

    fn request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn json_of(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_get_progress_returns_code_and_state() {
        // Arrange
        let store = InMemoryProgressStore::new();
        store.seed_user("tg:200", ProgressCode::ThirdAct, FixedClock::standard().0);
        let app = router().with_state(app_state_with(Arc::new(store)));

        // Act
        let response = app.oneshot(request("GET", "/users/tg:200")).await.unwrap();

        // Assert
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_of(response).await;
        assert_eq!(json["identity"], "tg:200");
        assert_eq!(json["progress_code"], "111");
        assert_eq!(json["state"], "third_act");
    }

    #[tokio::test]
    async fn test_get_progress_for_unknown_user_returns_404() {
        let app = router().with_state(app_state_with(Arc::new(InMemoryProgressStore::new())));

        let response = app.oneshot(request("GET", "/users/ghost")).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_of(response).await["error"], "user_not_found");
    }

    #[tokio::test]
    async fn test_reset_returns_default_code() {
        // Arrange
        let store = InMemoryProgressStore::new();
        store.seed_user("tg:201", ProgressCode::Final, FixedClock::standard().0);
        let app = router().with_state(app_state_with(Arc::new(store.clone())));

        // Act
        let response = app
            .oneshot(request("POST", "/users/tg:201/reset"))
            .await
            .unwrap();

        // Assert
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_of(response).await["progress_code"], "000");
        assert_eq!(
            store.user("tg:201").unwrap().progress_code,
            ProgressCode::Default
        );
        assert_eq!(store.history_len(), 0);
    }

    #[tokio::test]
    async fn test_delete_returns_204_then_404() {
        // Arrange
        let store = InMemoryProgressStore::new();
        store.seed_user("tg:202", ProgressCode::FirstAct, FixedClock::standard().0);
        let app = router().with_state(app_state_with(Arc::new(store.clone())));

        // Act
        let first = app
            .clone()
            .oneshot(request("DELETE", "/users/tg:202"))
            .await
            .unwrap();
        let second = app.oneshot(request("DELETE", "/users/tg:202")).await.unwrap();

        // Assert
        assert_eq!(first.status(), StatusCode::NO_CONTENT);
        assert_eq!(second.status(), StatusCode::NOT_FOUND);
        assert_eq!(store.user_count(), 0);
    }

    #[tokio::test]
    async fn test_history_of_fresh_user_is_empty_array() {
        let store = InMemoryProgressStore::new();
        store.seed_user("tg:203", ProgressCode::Default, FixedClock::standard().0);
        let app = router().with_state(app_state_with(Arc::new(store)));

        let response = app
            .oneshot(request("GET", "/users/tg:203/history"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_of(response).await, serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_unreachable_store_returns_503() {
        let app = router().with_state(app_state_with(Arc::new(FailingProgressStore)));

        let response = app.oneshot(request("GET", "/users/tg:204")).await.unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
