//! In-memory key/value cache with per-entry time-to-live
//!
//! Expired entries are never returned: `get` checks the deadline on read, and
//! a background sweeper drops expired entries to bound memory.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use uuid::Uuid;

use crate::core::db::models::ProfileResponse;
use crate::core::sweeper::SweeperHandle;

/// How often expired entries are purged
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// How long a profile stays cached
pub const PROFILE_TTL: Duration = Duration::from_secs(5 * 60);

/// Cached profile responses keyed by account id
pub type ProfileCache = ExpiringCache<Uuid, ProfileResponse>;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    /// `None` never expires
    expires_at: Option<Instant>,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

/// Thread-safe cache with per-entry expiry
#[derive(Debug)]
pub struct ExpiringCache<K, V> {
    entries: Arc<RwLock<HashMap<K, CacheEntry<V>>>>,
}

impl<K, V> Clone for ExpiringCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<K, V> Default for ExpiringCache<K, V> {
    fn default() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl<K, V> ExpiringCache<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value. A zero `ttl` means the entry never expires.
    pub async fn set(&self, key: K, value: V, ttl: Duration) {
        let expires_at = (!ttl.is_zero()).then(|| Instant::now() + ttl);
        self.entries
            .write()
            .await
            .insert(key, CacheEntry { value, expires_at });
    }

    /// Get a value if present and not expired
    pub async fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value.clone())
    }

    /// Remove a key. Absent keys are ignored.
    pub async fn delete(&self, key: &K) {
        self.entries.write().await.remove(key);
    }

    /// Remove everything
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Stored entries, including expired ones not yet purged
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Drop expired entries, returning how many were removed
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    /// Purge expired entries every `period` until the handle is stopped
    pub fn spawn_sweeper(&self, period: Duration) -> SweeperHandle {
        let cache = self.clone();
        SweeperHandle::spawn("cache", period, move || {
            let cache = cache.clone();
            async move {
                let removed = cache.purge_expired().await;
                if removed > 0 {
                    tracing::debug!(removed, "Purged expired cache entries");
                }
            }
        })
    }
}
