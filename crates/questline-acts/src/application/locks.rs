//! Per-identity serialization.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use questline_core::repository::UserIdentity;
use tokio::sync::OwnedMutexGuard;

/// One async lock per identity. Idle entries are pruned on every acquire.
#[derive(Debug, Default)]
pub struct IdentityLocks {
    inner: Mutex<HashMap<UserIdentity, Arc<tokio::sync::Mutex<()>>>>,
}

impl IdentityLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other event for `identity` is in flight.
    pub async fn acquire(&self, identity: &UserIdentity) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            map.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(map.entry(identity.clone()).or_default())
        };
        lock.lock_owned().await
    }

    /// Number of identities holding or waiting on their lock.
    #[must_use]
    pub fn active(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|lock| Arc::strong_count(lock) > 1)
            .count()
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
