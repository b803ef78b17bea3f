//! Test stores — in-memory `ProgressStore` implementations for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use questline_core::error::DomainError;
use questline_core::progress::ProgressCode;
use questline_core::repository::{
    HistoryEntry, NewHistoryEntry, ProgressStore, ProgressUnit, UserIdentity, UserRecord,
};
use uuid::Uuid;

/// Fault to inject into an [`InMemoryProgressStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    /// `commit` returns `DomainError::Persistence` and applies nothing.
    Commit,
    /// `get_or_create` returns `DomainError::NotFound`.
    MissingUser,
}

#[derive(Debug, Default)]
struct MemoryState {
    users: HashMap<UserIdentity, UserRecord>,
    history: Vec<(UserIdentity, HistoryEntry)>,
}

/// A store that keeps everything in memory while honouring unit-of-work
/// semantics: writes are staged per unit and applied only on commit.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProgressStore {
    state: Arc<Mutex<MemoryState>>,
    failure: Option<FailureMode>,
    commits: Arc<AtomicUsize>,
}

impl InMemoryProgressStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store that fails in the given way.
    #[must_use]
    pub fn failing_with(mode: FailureMode) -> Self {
        Self {
            failure: Some(mode),
            ..Self::default()
        }
    }

    /// Inserts a user directly, bypassing units.
    ///
    /// # Panics
    ///
    /// Panics if `identity` is blank or the internal mutex is poisoned.
    pub fn seed_user(
        &self,
        identity: &str,
        progress_code: ProgressCode,
        created_at: DateTime<Utc>,
    ) -> UserRecord {
        let identity = UserIdentity::parse(identity).unwrap();
        let record = UserRecord {
            id: Uuid::new_v4(),
            identity: identity.clone(),
            progress_code,
            created_at,
        };
        self.state
            .lock()
            .unwrap()
            .users
            .insert(identity, record.clone());
        record
    }

    /// Returns the committed record for `identity`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn user(&self, identity: &str) -> Option<UserRecord> {
        let identity = UserIdentity::parse(identity).ok()?;
        self.state.lock().unwrap().users.get(&identity).cloned()
    }

    /// Number of committed users.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn user_count(&self) -> usize {
        self.state.lock().unwrap().users.len()
    }

    /// Committed history rows for `identity`, oldest first.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn history_for(&self, identity: &str) -> Vec<HistoryEntry> {
        self.state
            .lock()
            .unwrap()
            .history
            .iter()
            .filter(|(owner, _)| owner.as_str() == identity)
            .map(|(_, entry)| entry.clone())
            .collect()
    }

    /// Total number of committed history rows.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn history_len(&self) -> usize {
        self.state.lock().unwrap().history.len()
    }

    /// Number of successful commits.
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProgressStore for InMemoryProgressStore {
    async fn begin(&self) -> Result<Box<dyn ProgressUnit>, DomainError> {
        let working = self.state.lock().unwrap().users.clone();
        Ok(Box::new(MemoryUnit {
            shared: Arc::clone(&self.state),
            working,
            staged: Vec::new(),
            failure: self.failure,
            commits: Arc::clone(&self.commits),
        }))
    }

    async fn find_user(&self, identity: &UserIdentity) -> Result<Option<UserRecord>, DomainError> {
        Ok(self.state.lock().unwrap().users.get(identity).cloned())
    }

    async fn load_history(&self, identity: &UserIdentity) -> Result<Vec<HistoryEntry>, DomainError> {
        Ok(self.history_for(identity.as_str()))
    }

    async fn delete_user(&self, identity: &UserIdentity) -> Result<bool, DomainError> {
        let mut state = self.state.lock().unwrap();
        let removed = state.users.remove(identity).is_some();
        state.history.retain(|(owner, _)| owner != identity);
        Ok(removed)
    }
}

#[derive(Debug)]
enum StagedWrite {
    CreateUser(UserRecord),
    SetProgress(UserIdentity, ProgressCode),
    AppendHistory(UserIdentity, HistoryEntry),
}

#[derive(Debug)]
struct MemoryUnit {
    shared: Arc<Mutex<MemoryState>>,
    working: HashMap<UserIdentity, UserRecord>,
    staged: Vec<StagedWrite>,
    failure: Option<FailureMode>,
    commits: Arc<AtomicUsize>,
}

#[async_trait]
impl ProgressUnit for MemoryUnit {
    async fn get_or_create(
        &mut self,
        identity: &UserIdentity,
        now: DateTime<Utc>,
    ) -> Result<UserRecord, DomainError> {
        if self.failure == Some(FailureMode::MissingUser) {
            return Err(DomainError::NotFound(identity.to_string()));
        }
        if let Some(existing) = self.working.get(identity) {
            return Ok(existing.clone());
        }
        let record = UserRecord {
            id: Uuid::new_v4(),
            identity: identity.clone(),
            progress_code: ProgressCode::Default,
            created_at: now,
        };
        self.working.insert(identity.clone(), record.clone());
        self.staged.push(StagedWrite::CreateUser(record.clone()));
        Ok(record)
    }

    async fn set_progress(
        &mut self,
        identity: &UserIdentity,
        code: ProgressCode,
    ) -> Result<(), DomainError> {
        let user = self
            .working
            .get_mut(identity)
            .ok_or_else(|| DomainError::NotFound(identity.to_string()))?;
        user.progress_code = code;
        self.staged
            .push(StagedWrite::SetProgress(identity.clone(), code));
        Ok(())
    }

    async fn append_history(&mut self, entry: NewHistoryEntry) -> Result<(), DomainError> {
        let user = self
            .working
            .get(&entry.identity)
            .ok_or_else(|| DomainError::NotFound(entry.identity.to_string()))?;
        let row = HistoryEntry {
            id: Uuid::now_v7(),
            user_id: user.id,
            channel_id: entry.channel_id,
            message_id: entry.message_id,
            content: entry.content,
            state_label: entry.state_label,
            created_at: entry.recorded_at,
        };
        self.staged
            .push(StagedWrite::AppendHistory(entry.identity, row));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        let MemoryUnit {
            shared,
            staged,
            failure,
            commits,
            ..
        } = *self;
        if failure == Some(FailureMode::Commit) {
            return Err(DomainError::Persistence("commit rejected".into()));
        }
        let mut state = shared.lock().unwrap();
        for write in staged {
            match write {
                StagedWrite::CreateUser(record) => {
                    state.users.entry(record.identity.clone()).or_insert(record);
                }
                StagedWrite::SetProgress(identity, code) => {
                    if let Some(user) = state.users.get_mut(&identity) {
                        user.progress_code = code;
                    }
                }
                StagedWrite::AppendHistory(identity, mut row) => {
                    if let Some(user) = state.users.get(&identity) {
                        row.user_id = user.id;
                    }
                    state.history.push((identity, row));
                }
            }
        }
        commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A store whose backend is unreachable. Every call returns
/// `DomainError::Connection`.
#[derive(Debug)]
pub struct FailingProgressStore;

#[async_trait]
impl ProgressStore for FailingProgressStore {
    async fn begin(&self) -> Result<Box<dyn ProgressUnit>, DomainError> {
        Err(DomainError::Connection("connection refused".into()))
    }

    async fn find_user(&self, _identity: &UserIdentity) -> Result<Option<UserRecord>, DomainError> {
        Err(DomainError::Connection("connection refused".into()))
    }

    async fn load_history(&self, _identity: &UserIdentity) -> Result<Vec<HistoryEntry>, DomainError> {
        Err(DomainError::Connection("connection refused".into()))
    }

    async fn delete_user(&self, _identity: &UserIdentity) -> Result<bool, DomainError> {
        Err(DomainError::Connection("connection refused".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
    }

    fn identity(raw: &str) -> UserIdentity {
        UserIdentity::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn test_get_or_create_twice_creates_one_user() {
        // Arrange
        let store = InMemoryProgressStore::new();
        let id = identity("tg:1");

        // Act
        let mut unit = store.begin().await.unwrap();
        let first = unit.get_or_create(&id, now()).await.unwrap();
        let second = unit.get_or_create(&id, now()).await.unwrap();
        unit.commit().await.unwrap();

        let mut unit = store.begin().await.unwrap();
        let third = unit.get_or_create(&id, now()).await.unwrap();
        unit.commit().await.unwrap();

        // Assert
        assert_eq!(first, second);
        assert_eq!(first.id, third.id);
        assert_eq!(store.user_count(), 1);
        assert_eq!(first.progress_code, ProgressCode::Default);
    }

    #[tokio::test]
    async fn test_dropped_unit_discards_writes() {
        // Arrange
        let store = InMemoryProgressStore::new();
        let id = identity("tg:2");

        // Act
        {
            let mut unit = store.begin().await.unwrap();
            unit.get_or_create(&id, now()).await.unwrap();
            unit.set_progress(&id, ProgressCode::ThirdAct).await.unwrap();
        }

        // Assert
        assert_eq!(store.user_count(), 0);
        assert_eq!(store.commit_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_commit_applies_nothing() {
        // Arrange
        let store = InMemoryProgressStore::failing_with(FailureMode::Commit);
        let id = identity("tg:3");

        // Act
        let mut unit = store.begin().await.unwrap();
        unit.get_or_create(&id, now()).await.unwrap();
        let result = unit.commit().await;

        // Assert
        assert!(matches!(result, Err(DomainError::Persistence(_))));
        assert_eq!(store.user_count(), 0);
    }

    #[tokio::test]
    async fn test_set_progress_for_unknown_user_is_not_found() {
        let store = InMemoryProgressStore::new();
        let mut unit = store.begin().await.unwrap();

        let result = unit
            .set_progress(&identity("ghost"), ProgressCode::FirstAct)
            .await;

        assert!(matches!(result, Err(DomainError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_user_removes_history() {
        // Arrange
        let store = InMemoryProgressStore::new();
        let id = identity("tg:4");
        let mut unit = store.begin().await.unwrap();
        unit.get_or_create(&id, now()).await.unwrap();
        unit.append_history(NewHistoryEntry {
            identity: id.clone(),
            channel_id: 7,
            message_id: 1,
            content: "/start".into(),
            state_label: "pre_check".into(),
            recorded_at: now(),
        })
        .await
        .unwrap();
        unit.commit().await.unwrap();

        // Act
        let removed = store.delete_user(&id).await.unwrap();

        // Assert
        assert!(removed);
        assert_eq!(store.history_len(), 0);
        assert!(!store.delete_user(&id).await.unwrap());
    }
}
