use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::future::Cache;
use moka::ops::compute::Op;
use moka::Expiry;
use shortbin_core::cache::{ReadCache, Result};
use tracing::{debug, trace};

pub const DEFAULT_MAX_CAPACITY: u64 = 10_000;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    ttl: Duration,
}

/// Expires each entry after the TTL it was last written with.
struct PerEntryTtl;

impl Expiry<String, Entry> for PerEntryTtl {
    fn expire_after_create(&self, _key: &String, entry: &Entry, _created_at: Instant) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

/// An in-process [`ReadCache`] backed by Moka.
///
/// Suited to single-node deployments and tests. Unlike a fixed
/// `time_to_live`, every entry carries its own TTL, so sliding refreshes
/// behave the same as on Redis.
///
/// Every write goes through Moka's per-key compute lock, so a TTL refresh
/// never puts back a value that a concurrent `set` has replaced.
#[derive(Clone)]
pub struct MokaReadCache {
    cache: Cache<String, Entry>,
}

impl MokaReadCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_CAPACITY)
    }

    /// Creates a cache holding at most `max_capacity` entries.
    pub fn with_capacity(max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(PerEntryTtl)
            .build();
        Self { cache }
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Rewrites a live entry with a new TTL and returns it.
    async fn retouch(&self, key: &str, ttl: Duration) -> Option<Entry> {
        self.cache
            .entry_by_ref(key)
            .and_compute_with(|current| {
                let op = match current {
                    Some(entry) => Op::Put(Entry {
                        ttl,
                        ..entry.into_value()
                    }),
                    None => Op::Nop,
                };
                std::future::ready(op)
            })
            .await
            .into_entry()
            .map(|entry| entry.into_value())
    }
}

impl Default for MokaReadCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MokaReadCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MokaReadCache")
            .field("entry_count", &self.cache.entry_count())
            .finish()
    }
}

#[async_trait]
impl ReadCache for MokaReadCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        match self.cache.get(key).await {
            Some(entry) => {
                debug!(key, "Cache hit in Moka");
                Ok(Some(entry.value))
            }
            None => {
                trace!(key, "Cache miss in Moka");
                Ok(None)
            }
        }
    }

    async fn get_refreshing_expiry(&self, key: &str, ttl: Duration) -> Result<Option<String>> {
        match self.retouch(key, ttl).await {
            Some(entry) => {
                debug!(key, ?ttl, "Cache hit in Moka, expiry refreshed");
                Ok(Some(entry.value))
            }
            None => {
                trace!(key, "Cache miss in Moka");
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let entry = Entry {
            value: value.to_string(),
            ttl,
        };
        self.cache
            .entry_by_ref(key)
            .and_compute_with(|_| std::future::ready(Op::Put(entry)))
            .await;
        trace!(key, ?ttl, "Cached value in Moka");
        Ok(())
    }

    async fn set_expiry(&self, key: &str, ttl: Duration) -> Result<bool> {
        Ok(self.retouch(key, ttl).await.is_some())
    }
}
