//! Search cache configuration.
//!
//! Controlled by the `[cache]` section of `bookshelf.toml`.

use std::num::NonZeroUsize;
use std::time::Duration;

const DEFAULT_TTL_SECONDS: u64 = 3600;
const DEFAULT_KEY_PREFIX: &str = "bookshelf:";
const DEFAULT_MEMORY_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Redis connection URL; the in-process store is used when absent.
    pub redis_url: Option<String>,
    /// Lifetime of a cached search page.
    pub ttl: Duration,
    /// Prepended to every key written to the shared store.
    pub key_prefix: String,
    /// Maximum entries held by the in-process store.
    pub memory_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            ttl: Duration::from_secs(DEFAULT_TTL_SECONDS),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            redis_url: settings.redis_url.clone(),
            ttl: settings.ttl,
            key_prefix: settings.key_prefix.clone(),
            memory_capacity: settings.memory_capacity,
        }
    }
}

impl CacheConfig {
    /// Returns the memory capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn memory_capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.memory_capacity).unwrap_or(NonZeroUsize::MIN)
    }

    /// Redis `EX` argument; never below one second.
    pub fn ttl_seconds(&self) -> u64 {
        self.ttl.as_secs().max(1)
    }
}
