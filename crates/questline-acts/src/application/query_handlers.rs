//! Query handlers for user progress and history.
//!
//! Queries read committed state outside any unit of work and return
//! read-only view DTOs.

use chrono::{DateTime, Utc};
use questline_core::error::DomainError;
use questline_core::progress::{ProgressCode, StateId};
use questline_core::repository::{HistoryEntry, ProgressStore, UserIdentity, UserRecord};
use questline_core::resolver;
use serde::Serialize;
use uuid::Uuid;

/// Read-only view of a user's progress.
#[derive(Debug, Serialize)]
pub struct ProgressView {
    pub user_id: Uuid,
    pub identity: UserIdentity,
    pub progress_code: ProgressCode,
    /// The state a resuming user lands in.
    pub state: StateId,
    pub created_at: DateTime<Utc>,
}

impl From<UserRecord> for ProgressView {
    fn from(user: UserRecord) -> Self {
        Self {
            user_id: user.id,
            state: resolver::resolve(user.progress_code),
            identity: user.identity,
            progress_code: user.progress_code,
            created_at: user.created_at,
        }
    }
}

/// Retrieves a user's progress.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the user does not exist.
/// Returns `DomainError::Persistence` or `DomainError::Connection` if the
/// store fails.
pub async fn get_progress(
    identity: &UserIdentity,
    store: &dyn ProgressStore,
) -> Result<ProgressView, DomainError> {
    store
        .find_user(identity)
        .await?
        .map(ProgressView::from)
        .ok_or_else(|| DomainError::NotFound(identity.to_string()))
}

/// Retrieves a user's history, oldest first.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the user does not exist.
pub async fn get_history(
    identity: &UserIdentity,
    store: &dyn ProgressStore,
) -> Result<Vec<HistoryEntry>, DomainError> {
    if store.find_user(identity).await?.is_none() {
        return Err(DomainError::NotFound(identity.to_string()));
    }
    store.load_history(identity).await
}
