use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use shortbin_core::cache::{ReadCache, Result};
use shortbin_core::CacheError;

pub const DEFAULT_CACHE_TIMEOUT: Duration = Duration::from_secs(3);

/// Bounds every call on the wrapped cache.
///
/// A call that exceeds the limit fails with [`CacheError::Timeout`]; the
/// caller treats it like any other cache error.
#[derive(Debug, Clone)]
pub struct TimeoutCache<C> {
    inner: C,
    timeout: Duration,
}

impl<C: ReadCache> TimeoutCache<C> {
    pub fn new(inner: C, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn with_default_timeout(inner: C) -> Self {
        Self::new(inner, DEFAULT_CACHE_TIMEOUT)
    }

    async fn bounded<T>(&self, op: &str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .unwrap_or_else(|_| {
                Err(CacheError::Timeout(format!(
                    "{op} exceeded {:?}",
                    self.timeout
                )))
            })
    }
}

#[async_trait]
impl<C: ReadCache> ReadCache for TimeoutCache<C> {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.bounded("get", self.inner.get(key)).await
    }

    async fn get_refreshing_expiry(&self, key: &str, ttl: Duration) -> Result<Option<String>> {
        self.bounded(
            "get_refreshing_expiry",
            self.inner.get_refreshing_expiry(key, ttl),
        )
        .await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.bounded("set", self.inner.set(key, value, ttl)).await
    }

    async fn set_expiry(&self, key: &str, ttl: Duration) -> Result<bool> {
        self.bounded("set_expiry", self.inner.set_expiry(key, ttl))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MokaReadCache;

    struct StalledCache;

    #[async_trait]
    impl ReadCache for StalledCache {
        async fn get(&self, _key: &str) -> Result<Option<String>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(None)
        }

        async fn get_refreshing_expiry(&self, key: &str, _ttl: Duration) -> Result<Option<String>> {
            self.get(key).await
        }

        async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<()> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }

        async fn set_expiry(&self, _key: &str, _ttl: Duration) -> Result<bool> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(false)
        }
    }

    #[tokio::test]
    async fn stalled_backend_times_out() {
        let cache = TimeoutCache::new(StalledCache, Duration::from_millis(20));

        let err = cache.get("abc123").await.unwrap_err();
        assert!(matches!(err, CacheError::Timeout(_)));

        let err = cache
            .set("abc123", "v", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::Timeout(_)));
    }

    #[tokio::test]
    async fn fast_backend_passes_through() {
        let cache = TimeoutCache::with_default_timeout(MokaReadCache::new());
        cache
            .set("abc123", "v", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(cache.get("abc123").await.unwrap().as_deref(), Some("v"));
    }
}
