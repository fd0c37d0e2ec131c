use crate::error::Result;
use async_trait::async_trait;
use jiff::Timestamp;
use shortbin_core::UrlRecord;

#[derive(Debug, Clone)]
pub struct ShortenParams {
    /// The URL to shorten.
    pub long_url: String,
    /// Creating account, `None` for anonymous links.
    pub owner: Option<String>,
    /// Explicit expiry; defaults to creation time plus the configured lifetime.
    pub expires_at: Option<Timestamp>,
}

#[async_trait]
pub trait Shortener: Send + Sync + 'static {
    /// Creates a short link and returns the stored record.
    async fn shorten(&self, params: ShortenParams) -> Result<UrlRecord>;
}
