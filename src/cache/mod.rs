//! Search result caching.
//!
//! - **Keys**: [`SearchFingerprint`] turns a normalized search into a stable key
//! - **Stores**: [`RedisSearchCache`] when `cache.redis_url` is set, otherwise
//!   the in-process [`MemorySearchCache`]
//! - **In-flight map**: [`InFlight`] collapses concurrent identical searches
//!
//! ```toml
//! [cache]
//! redis_url = "redis://127.0.0.1:6379"
//! ttl_seconds = 3600
//! key_prefix = "bookshelf:"
//! ```

mod config;
mod inflight;
mod keys;
mod lock;
mod redis_store;
mod store;

use std::sync::Arc;

use tracing::{info, warn};

pub use config::CacheConfig;
pub use inflight::{InFlight, Participation};
pub use keys::SearchFingerprint;
pub use redis_store::RedisSearchCache;
pub use store::{CacheError, CachedSearch, MemorySearchCache, SearchCache};

/// Build the configured store, falling back to memory when Redis is unreachable.
pub async fn connect(config: &CacheConfig) -> Arc<dyn SearchCache> {
    let Some(url) = config.redis_url.as_deref() else {
        info!(
            capacity = config.memory_capacity,
            "Using in-process search cache"
        );
        return Arc::new(MemorySearchCache::new(config));
    };

    match RedisSearchCache::connect(url, config).await {
        Ok(cache) => {
            info!(ttl_seconds = config.ttl_seconds(), "Connected to Redis search cache");
            Arc::new(cache)
        }
        Err(err) => {
            warn!(
                error = %err,
                "Redis search cache unavailable; falling back to in-process cache"
            );
            Arc::new(MemorySearchCache::new(config))
        }
    }
}
