//! Search result storage.
//!
//! [`SearchCache`] abstracts the key-value store that holds recent search
//! pages. The in-process [`MemorySearchCache`] backs single-node deployments
//! and tests; the Redis store lives in [`super::redis_store`].

use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::entities::BookRecord;

use super::config::CacheConfig;
use super::lock::mutex_lock;

const SOURCE: &str = "cache::store";

/// Payload stored per search key. Page metadata is rebuilt from the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedSearch {
    pub books: Vec<BookRecord>,
    pub total: u64,
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),
    #[error("cache payload could not be encoded or decoded: {0}")]
    Codec(#[from] serde_json::Error),
}

impl CacheError {
    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }
}

#[async_trait]
pub trait SearchCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<CachedSearch>, CacheError>;

    async fn set(&self, key: &str, value: &CachedSearch) -> Result<(), CacheError>;

    /// Drop every search entry owned by this cache.
    async fn clear(&self) -> Result<(), CacheError>;
}

struct MemoryEntry {
    /// `None` when the TTL reaches past what `Instant` can represent.
    expires_at: Option<Instant>,
    value: CachedSearch,
}

/// LRU-bounded in-process store with per-entry expiry.
pub struct MemorySearchCache {
    ttl: Duration,
    entries: Mutex<LruCache<String, MemoryEntry>>,
}

impl MemorySearchCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            ttl: config.ttl,
            entries: Mutex::new(LruCache::new(config.memory_capacity_non_zero())),
        }
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SearchCache for MemorySearchCache {
    async fn get(&self, key: &str) -> Result<Option<CachedSearch>, CacheError> {
        let mut entries = mutex_lock(&self.entries, SOURCE, "get");
        let expired = match entries.get(key) {
            Some(entry) if entry.expires_at.is_none_or(|at| at > Instant::now()) => {
                return Ok(Some(entry.value.clone()));
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &CachedSearch) -> Result<(), CacheError> {
        let entry = MemoryEntry {
            expires_at: Instant::now().checked_add(self.ttl),
            value: value.clone(),
        };
        mutex_lock(&self.entries, SOURCE, "set").put(key.to_string(), entry);
        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        mutex_lock(&self.entries, SOURCE, "clear").clear();
        Ok(())
    }
}
