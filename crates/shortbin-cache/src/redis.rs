use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use shortbin_core::cache::{ReadCache, Result};
use shortbin_core::CacheError;
use tracing::{debug, trace, warn, Instrument};

pub const DEFAULT_KEY_PREFIX: &str = "sb:url:";

/// A Redis-backed [`ReadCache`].
///
/// Values are stored as plain strings under a configurable key prefix.
/// Expiry uses millisecond precision (`PSETEX` / `PEXPIRE`).
#[derive(Debug, Clone)]
pub struct RedisReadCache {
    conn: redis::aio::MultiplexedConnection,
    key_prefix: String,
}

fn map_redis_error(operation: &str, err: redis::RedisError) -> CacheError {
    let message = format!("{operation}: {err}");
    if err.is_timeout() {
        CacheError::Timeout(message)
    } else if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
        CacheError::Unavailable(message)
    } else {
        CacheError::Operation(message)
    }
}

fn ttl_millis(ttl: Duration) -> u64 {
    // PSETEX rejects zero; round sub-millisecond TTLs up.
    (ttl.as_millis() as u64).max(1)
}

impl RedisReadCache {
    pub fn new(conn: redis::aio::MultiplexedConnection) -> Self {
        Self::with_prefix(conn, DEFAULT_KEY_PREFIX)
    }

    /// Creates a cache with a custom key prefix (e.g. `"myapp:url:"`).
    pub fn with_prefix(
        conn: redis::aio::MultiplexedConnection,
        key_prefix: impl Into<String>,
    ) -> Self {
        Self {
            conn,
            key_prefix: key_prefix.into(),
        }
    }

    /// Connects to `url` and builds a cache over a multiplexed connection.
    pub async fn connect(url: &str, key_prefix: impl Into<String>) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| map_redis_error("failed to open Redis client", e))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| map_redis_error("failed to connect to Redis", e))?;
        Ok(Self::with_prefix(conn, key_prefix))
    }

    fn cache_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }
}

#[async_trait]
impl ReadCache for RedisReadCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let full_key = self.cache_key(key);
        trace!(key, "Fetching value from Redis cache");

        let mut conn = self.conn.clone();
        match conn.get::<_, Option<String>>(&full_key).await {
            Ok(Some(value)) => {
                debug!(key, "Cache hit in Redis");
                Ok(Some(value))
            }
            Ok(None) => {
                trace!(key, "Cache miss in Redis");
                Ok(None)
            }
            Err(e) => {
                warn!(key, error = %e, "Redis error on get");
                Err(map_redis_error("failed to fetch value from Redis", e))
            }
        }
    }

    async fn get_refreshing_expiry(&self, key: &str, ttl: Duration) -> Result<Option<String>> {
        let value = self.get(key).await?;
        if value.is_none() {
            return Ok(None);
        }

        let mut conn = self.conn.clone();
        let full_key = self.cache_key(key);
        let millis = ttl_millis(ttl) as i64;
        tokio::spawn(
            async move {
                if let Err(e) = conn.pexpire::<_, bool>(&full_key, millis).await {
                    warn!(key = %full_key, error = %e, "Failed to refresh expiry in Redis");
                }
            }
            .in_current_span(),
        );

        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let full_key = self.cache_key(key);
        trace!(key, ?ttl, "Storing value in Redis cache");

        let mut conn = self.conn.clone();
        match conn
            .pset_ex::<_, _, ()>(&full_key, value, ttl_millis(ttl))
            .await
        {
            Ok(()) => {
                debug!(key, "Cached value in Redis");
                Ok(())
            }
            Err(e) => {
                warn!(key, error = %e, "Failed to cache value in Redis");
                Err(map_redis_error("failed to write value to Redis", e))
            }
        }
    }

    async fn set_expiry(&self, key: &str, ttl: Duration) -> Result<bool> {
        let full_key = self.cache_key(key);

        let mut conn = self.conn.clone();
        conn.pexpire::<_, bool>(&full_key, ttl_millis(ttl) as i64)
            .await
            .map_err(|e| map_redis_error("failed to set expiry in Redis", e))
    }
}
