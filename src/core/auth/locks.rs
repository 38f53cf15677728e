//! Per-account mutation locks
//!
//! Serializes read-check-write sequences on a single account (failed-login
//! counting, lockout, unlock, password reset) inside this process.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct AccountLocks {
    locks: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to an account. The guard releases on drop.
    pub async fn acquire(&self, account_id: Uuid) -> OwnedMutexGuard<()> {
        // The map shard guard must not be held across the await below
        let lock = self.locks.entry(account_id).or_default().clone();
        lock.lock_owned().await
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
