use crate::Result;
use async_trait::async_trait;
use shortbin_core::RequestMeta;

/// Outcome of a successful resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub long_url: String,
    /// Owning account, when known. `None` for anonymous links and for
    /// cache entries that did not record an owner.
    pub owner: Option<String>,
    pub cache_hit: bool,
}

#[async_trait]
pub trait Redirector: Send + Sync + 'static {
    /// Resolves a raw short id to its redirect target.
    ///
    /// `meta` describes the inbound request and is only used for the
    /// access event.
    async fn resolve(&self, raw_id: &str, meta: RequestMeta) -> Result<Resolution>;
}
