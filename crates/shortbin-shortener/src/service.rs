use std::sync::Arc;

use async_trait::async_trait;
use jiff::{SignedDuration, Timestamp};
use shortbin_core::{Repository, StorageError, UrlRecord};
use shortbin_generator::Generator;
use tracing::{debug, warn};
use typed_builder::TypedBuilder;

use crate::error::{Result, ShortenerError};
use crate::shortener::{ShortenParams, Shortener};

pub const DEFAULT_LINK_LIFETIME: SignedDuration = SignedDuration::from_hours(24 * 365);
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, TypedBuilder)]
pub struct ShortenerSettings {
    /// Added to the creation time when no explicit expiry is given.
    #[builder(default = DEFAULT_LINK_LIFETIME)]
    pub link_lifetime: SignedDuration,
    /// Insert attempts before giving up on id collisions.
    #[builder(default = DEFAULT_MAX_ATTEMPTS)]
    pub max_attempts: usize,
}

impl Default for ShortenerSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Creates short links on top of a [`Repository`] and a [`Generator`].
///
/// Generated ids are random, so a collision surfaces as a storage conflict
/// and is retried with a fresh id.
#[derive(Debug, Clone)]
pub struct ShortenerService<R, G> {
    repository: Arc<R>,
    generator: Arc<G>,
    settings: ShortenerSettings,
}

impl<R: Repository, G: Generator> ShortenerService<R, G> {
    pub fn new(repository: R, generator: G, settings: ShortenerSettings) -> Self {
        Self {
            repository: Arc::new(repository),
            generator: Arc::new(generator),
            settings,
        }
    }

    /// Validates that the URL has an http(s) scheme and a host, and that it
    /// can be sent back verbatim in a `Location` header.
    fn validate_url(url: &str) -> Result<()> {
        if url.trim().is_empty() {
            return Err(ShortenerError::InvalidUrl(
                "URL cannot be empty".to_string(),
            ));
        }

        if url.chars().any(|c| c.is_ascii_control() || c.is_whitespace()) {
            return Err(ShortenerError::InvalidUrl(format!(
                "URL must not contain whitespace or control characters: {url:?}"
            )));
        }

        let Some((scheme, rest)) = url.split_once("://") else {
            return Err(ShortenerError::InvalidUrl(format!(
                "URL must have a valid scheme and host: {url}"
            )));
        };

        let scheme = scheme.to_ascii_lowercase();
        if scheme != "http" && scheme != "https" {
            return Err(ShortenerError::InvalidUrl(format!(
                "URL scheme must be http or https: {scheme}"
            )));
        }

        let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
        if host.is_empty() || host.chars().any(char::is_whitespace) {
            return Err(ShortenerError::InvalidUrl(format!(
                "URL must have a valid host: {url}"
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl<R: Repository, G: Generator> Shortener for ShortenerService<R, G> {
    async fn shorten(&self, params: ShortenParams) -> Result<UrlRecord> {
        Self::validate_url(&params.long_url)?;

        let created_at = Timestamp::now();
        let expires_at = match params.expires_at {
            Some(at) if at <= created_at => return Err(ShortenerError::InvalidExpiry),
            Some(at) => at,
            None => created_at
                .checked_add(self.settings.link_lifetime)
                .map_err(|e| ShortenerError::InvalidLifetime(e.to_string()))?,
        };

        let attempts = self.settings.max_attempts.max(1);
        for attempt in 1..=attempts {
            let record = UrlRecord {
                short_id: self.generator.generate(),
                long_url: params.long_url.clone(),
                owner_id: params.owner.clone(),
                created_at,
                expires_at,
            };

            match self.repository.insert(record.clone()).await {
                Ok(()) => {
                    debug!(short_id = %record.short_id, attempt, "Created short link");
                    return Ok(record);
                }
                Err(StorageError::Conflict(id)) => {
                    warn!(short_id = %id, attempt, "Generated short id already taken");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(ShortenerError::Exhausted(attempts))
    }
}
