use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jiff::Timestamp;
use shortbin_core::{
    AccessEvent, EventSink, ReadCache, ReadRepository, RequestMeta, ShortId, ShortIdPolicy,
    StorageError, Topic, UrlRecord,
};
use tracing::{debug, trace, warn, Instrument};
use typed_builder::TypedBuilder;

use crate::inflight::InflightLookups;
use crate::redirector::{Redirector, Resolution};
use crate::value::CachedTarget;
use crate::{RedirectError, Result};

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, TypedBuilder)]
pub struct ResolverSettings {
    /// Accepted id lengths; anything outside is rejected up front.
    #[builder(default)]
    pub policy: ShortIdPolicy,
    /// Sliding TTL for cache entries, reset on every hit.
    #[builder(default = DEFAULT_CACHE_TTL)]
    pub cache_ttl: Duration,
    /// Share one storage lookup between concurrent misses for the same id.
    #[builder(default = false)]
    pub coalesce_misses: bool,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Cache-aside resolution of short ids.
///
/// The cache is consulted first and any cache failure counts as a miss.
/// Storage is authoritative. Cache population and access events run as
/// detached tasks: they never delay or fail a resolution, and they keep
/// running if the caller goes away.
pub struct RedirectResolver<R, C, E> {
    repository: Arc<R>,
    cache: Arc<C>,
    events: Arc<E>,
    settings: ResolverSettings,
    inflight: InflightLookups,
}

impl<R, C, E> RedirectResolver<R, C, E>
where
    R: ReadRepository,
    C: ReadCache,
    E: EventSink,
{
    pub fn new(repository: R, cache: C, events: E, settings: ResolverSettings) -> Self {
        Self {
            repository: Arc::new(repository),
            cache: Arc::new(cache),
            events: Arc::new(events),
            settings,
            inflight: InflightLookups::new(),
        }
    }

    async fn read_cache(&self, id: &ShortId) -> Option<CachedTarget> {
        let raw = match self
            .cache
            .get_refreshing_expiry(id.as_str(), self.settings.cache_ttl)
            .await
        {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                trace!(short_id = %id, "Cache miss");
                return None;
            }
            Err(e) => {
                warn!(short_id = %id, error = %e, "Cache read failed, falling back to storage");
                return None;
            }
        };

        let target = CachedTarget::decode(&raw);
        if target.is_none() {
            warn!(short_id = %id, "Unreadable cache value, falling back to storage");
        }
        target
    }

    async fn read_storage(&self, id: &ShortId) -> std::result::Result<Option<UrlRecord>, StorageError> {
        if self.settings.coalesce_misses {
            self.inflight
                .run(id, || self.repository.get(id))
                .await
        } else {
            self.repository.get(id).await
        }
    }

    /// TTL for a fresh entry: the sliding TTL, capped by the record's own expiry.
    fn entry_ttl(&self, record: &UrlRecord, now: Timestamp) -> Duration {
        let remaining = record.expires_at.duration_since(now);
        match Duration::try_from(remaining) {
            Ok(remaining) => remaining.min(self.settings.cache_ttl),
            Err(_) => Duration::ZERO,
        }
    }

    fn populate_cache(&self, id: &ShortId, record: &UrlRecord, ttl: Duration) {
        let value = match CachedTarget::from(record).encode() {
            Ok(value) => value,
            Err(e) => {
                warn!(short_id = %id, error = %e, "Failed to encode cache value");
                return;
            }
        };

        let cache = Arc::clone(&self.cache);
        let key = id.as_str().to_string();
        spawn_detached("cache population", async move {
            cache.set(&key, &value, ttl).await
        });
    }

    fn publish_access(&self, id: &ShortId, owner: Option<&str>, long_url: &str, meta: RequestMeta) {
        let topic = Topic::for_owner(owner);
        let event = AccessEvent::new(id, owner, long_url, meta);
        let events = Arc::clone(&self.events);
        spawn_detached("access event", async move { events.publish(topic, event).await });
    }
}

/// Runs `job` in the background, detached from the caller. Failures are
/// logged and go nowhere else.
fn spawn_detached<F, E>(job: &'static str, fut: F)
where
    F: Future<Output = std::result::Result<(), E>> + Send + 'static,
    E: Display,
{
    tokio::spawn(
        async move {
            if let Err(e) = fut.await {
                warn!(job, error = %e, "Background job failed");
            }
        }
        .in_current_span(),
    );
}

#[async_trait]
impl<R, C, E> Redirector for RedirectResolver<R, C, E>
where
    R: ReadRepository,
    C: ReadCache,
    E: EventSink,
{
    async fn resolve(&self, raw_id: &str, meta: RequestMeta) -> Result<Resolution> {
        let id = self.settings.policy.parse(raw_id)?;
        trace!(short_id = %id, "Resolving short id");
        let now = Timestamp::now();

        if let Some(target) = self.read_cache(&id).await {
            if target.is_expired_at(now) {
                debug!(short_id = %id, "Cached link has expired");
                return Err(RedirectError::NotFound);
            }

            debug!(short_id = %id, "Cache hit");
            self.publish_access(&id, target.owner.as_deref(), &target.url, meta);
            return Ok(Resolution {
                long_url: target.url,
                owner: target.owner,
                cache_hit: true,
            });
        }

        let record = self.read_storage(&id).await?.ok_or_else(|| {
            debug!(short_id = %id, "Short id not found");
            RedirectError::NotFound
        })?;

        if record.is_expired_at(now) {
            debug!(short_id = %id, "Stored link has expired");
            return Err(RedirectError::NotFound);
        }

        debug!(short_id = %id, "Resolved from storage");
        self.populate_cache(&id, &record, self.entry_ttl(&record, now));
        self.publish_access(&id, record.owner_id.as_deref(), &record.long_url, meta);

        Ok(Resolution {
            long_url: record.long_url,
            owner: record.owner_id,
            cache_hit: false,
        })
    }
}
