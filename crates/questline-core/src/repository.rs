//! Progress store abstraction.
//!
//! Writes go through a [`ProgressUnit`], a transactional scope opened by
//! [`ProgressStore::begin`]. Nothing a unit writes is visible until
//! [`ProgressUnit::commit`] succeeds; dropping a unit without committing
//! discards its writes.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;
use crate::progress::ProgressCode;

/// Opaque, stable identity of a chat user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserIdentity(String);

impl UserIdentity {
    /// Validates and wraps a raw identity.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the identity is empty or blank.
    pub fn parse(raw: impl Into<String>) -> Result<Self, DomainError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(DomainError::Validation("identity must not be empty".into()));
        }
        Ok(Self(raw))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for UserIdentity {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<UserIdentity> for String {
    fn from(value: UserIdentity) -> Self {
        value.0
    }
}

/// Stored representation of a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    /// Internal primary key.
    pub id: Uuid,
    /// External identity.
    pub identity: UserIdentity,
    /// Current progress code.
    pub progress_code: ProgressCode,
    /// When the user first made contact.
    pub created_at: DateTime<Utc>,
}

/// A history row to be appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewHistoryEntry {
    /// Owner of the entry.
    pub identity: UserIdentity,
    /// Chat the event arrived on.
    pub channel_id: i64,
    /// Transport message identifier.
    pub message_id: i64,
    /// Message text or callback payload.
    pub content: String,
    /// Label of the state that handled the event.
    pub state_label: String,
    /// Processing time.
    pub recorded_at: DateTime<Utc>,
}

/// A persisted history row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub channel_id: i64,
    pub message_id: i64,
    pub content: String,
    pub state_label: String,
    pub created_at: DateTime<Utc>,
}

/// Entry point to the persistence backend.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Opens a transactional unit.
    async fn begin(&self) -> Result<Box<dyn ProgressUnit>, DomainError>;

    /// Looks a user up outside of any unit.
    async fn find_user(&self, identity: &UserIdentity) -> Result<Option<UserRecord>, DomainError>;

    /// Loads a user's history, oldest first.
    async fn load_history(&self, identity: &UserIdentity) -> Result<Vec<HistoryEntry>, DomainError>;

    /// Deletes a user and, by cascade, their history. Returns `false` if the
    /// user did not exist.
    async fn delete_user(&self, identity: &UserIdentity) -> Result<bool, DomainError>;
}

/// A single transactional scope over the store.
#[async_trait]
pub trait ProgressUnit: Send {
    /// Returns the user, creating it with the default code if absent.
    /// Calling it twice for the same identity yields the same record.
    async fn get_or_create(
        &mut self,
        identity: &UserIdentity,
        now: DateTime<Utc>,
    ) -> Result<UserRecord, DomainError>;

    /// Overwrites the user's progress code.
    ///
    /// Returns `DomainError::NotFound` if the user does not exist.
    async fn set_progress(
        &mut self,
        identity: &UserIdentity,
        code: ProgressCode,
    ) -> Result<(), DomainError>;

    /// Appends one history row.
    ///
    /// Returns `DomainError::NotFound` if the owning user does not exist.
    async fn append_history(&mut self, entry: NewHistoryEntry) -> Result<(), DomainError>;

    /// Makes every write in this unit durable.
    async fn commit(self: Box<Self>) -> Result<(), DomainError>;
}
