//! Redis-backed search cache shared across instances.

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::debug;

use super::config::CacheConfig;
use super::store::{CacheError, CachedSearch, SearchCache};

const SCAN_BATCH: usize = 200;

#[derive(Clone)]
pub struct RedisSearchCache {
    connection: ConnectionManager,
    ttl_seconds: u64,
    key_prefix: String,
}

impl RedisSearchCache {
    pub async fn connect(url: &str, config: &CacheConfig) -> Result<Self, CacheError> {
        let client = redis::Client::open(url).map_err(CacheError::backend)?;
        let connection = ConnectionManager::new(client)
            .await
            .map_err(CacheError::backend)?;
        Ok(Self {
            connection,
            ttl_seconds: config.ttl_seconds(),
            key_prefix: config.key_prefix.clone(),
        })
    }
}

#[async_trait]
impl SearchCache for RedisSearchCache {
    async fn get(&self, key: &str) -> Result<Option<CachedSearch>, CacheError> {
        let mut connection = self.connection.clone();
        let raw: Option<String> = connection.get(key).await.map_err(CacheError::backend)?;
        match raw {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &CachedSearch) -> Result<(), CacheError> {
        let payload = serde_json::to_string(value)?;
        let mut connection = self.connection.clone();
        let _: () = connection
            .set_ex(key, payload, self.ttl_seconds)
            .await
            .map_err(CacheError::backend)?;
        Ok(())
    }

    /// Deletes keys under `{prefix}search:` using SCAN, never KEYS.
    async fn clear(&self) -> Result<(), CacheError> {
        let pattern = format!("{}search:*", self.key_prefix);
        let mut connection = self.connection.clone();
        let mut cursor: u64 = 0;
        let mut removed = 0usize;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut connection)
                .await
                .map_err(CacheError::backend)?;

            if !keys.is_empty() {
                removed += keys.len();
                let _: () = connection
                    .del(keys)
                    .await
                    .map_err(CacheError::backend)?;
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        debug!(pattern, removed, "Cleared search cache entries");
        Ok(())
    }
}
