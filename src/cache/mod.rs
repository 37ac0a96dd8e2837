//! History Cache
//!
//! TTL-based key-value cache for serialized transaction-history pages,
//! keyed by user, page number and page size. Best-effort only: it is read
//! before the store and invalidated after mutations, but it is never the
//! source of truth and its failures never surface to callers.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Cache-layer error. Always logged and swallowed by the engine.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Backend(String),
}

/// Cache key for one history page.
pub fn history_key(user_id: Uuid, page: i64, limit: i64) -> String {
    format!("transactions:{}:{}:{}", user_id, page, limit)
}

/// Key prefix shared by all of a user's history pages. Invalidation deletes
/// every key under it.
pub fn history_prefix(user_id: Uuid) -> String {
    format!("transactions:{}:", user_id)
}

#[async_trait]
pub trait HistoryCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Scan-and-delete every key starting with `prefix`; returns how many
    /// matching entries were removed. Racy under concurrent writers; stale
    /// pages are bounded by the TTL.
    async fn delete_prefix(&self, prefix: &str) -> Result<u64, CacheError>;
}

/// In-process [`HistoryCache`] backed by a map of expiring entries.
#[derive(Default)]
pub struct MemoryHistoryCache {
    entries: RwLock<HashMap<String, (Instant, String)>>,
}

impl MemoryHistoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryCache for MemoryHistoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let entries = self.entries.read().await;

        Ok(entries.get(key).and_then(|(expires_at, value)| {
            if Instant::now() < *expires_at {
                Some(value.clone())
            } else {
                None
            }
        }))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut entries = self.entries.write().await;

        let now = Instant::now();
        entries.retain(|_, (expires_at, _)| now < *expires_at);
        entries.insert(key.to_string(), (now + ttl, value.to_string()));
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64, CacheError> {
        let mut entries = self.entries.write().await;

        let now = Instant::now();
        let mut deleted = 0u64;
        entries.retain(|key, (expires_at, _)| {
            if key.starts_with(prefix) {
                deleted += 1;
                return false;
            }
            now < *expires_at
        });
        Ok(deleted)
    }
}
