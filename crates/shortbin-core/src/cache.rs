use crate::error::CacheError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, CacheError>;

/// A string key/value cache with per-entry expiry.
///
/// This is the read cache consulted by the redirect path. Keys are short
/// identifiers, values are opaque strings encoded by the caller.
/// `Ok(None)` always means "key absent"; any `Err` is a backend failure the
/// caller may choose to absorb.
#[async_trait]
pub trait ReadCache: Send + Sync + 'static {
    /// Reads a value without touching its expiry.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Reads a value and, on a hit, resets its expiry to `ttl`.
    ///
    /// The refresh runs in the background; the read returns as soon as the
    /// value is known.
    async fn get_refreshing_expiry(&self, key: &str, ttl: Duration) -> Result<Option<String>>;

    /// Stores a value that expires after `ttl`.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Resets the expiry of an existing key.
    ///
    /// Returns `false` when the key does not exist.
    async fn set_expiry(&self, key: &str, ttl: Duration) -> Result<bool>;
}

#[async_trait]
impl<T: ReadCache + ?Sized> ReadCache for Arc<T> {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key).await
    }

    async fn get_refreshing_expiry(&self, key: &str, ttl: Duration) -> Result<Option<String>> {
        (**self).get_refreshing_expiry(key, ttl).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        (**self).set(key, value, ttl).await
    }

    async fn set_expiry(&self, key: &str, ttl: Duration) -> Result<bool> {
        (**self).set_expiry(key, ttl).await
    }
}
