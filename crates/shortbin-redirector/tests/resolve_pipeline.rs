use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use jiff::{SignedDuration, Timestamp};
use shortbin_cache::MokaReadCache;
use shortbin_core::{
    AccessEvent, CacheError, EventError, EventSink, ReadCache, ReadRepository, RequestMeta,
    ShortId, ShortIdPolicy, StorageError, Topic, UrlRecord,
};
use shortbin_events::MemorySink;
use shortbin_redirector::{
    CachedTarget, RedirectError, RedirectResolver, Redirector, ResolverSettings,
};
use shortbin_storage::{InMemoryRepository, Repository};

/// Counts reads against an in-memory store, optionally slowing them down.
#[derive(Default)]
struct CountingRepository {
    inner: InMemoryRepository,
    gets: AtomicUsize,
    delay: Option<Duration>,
}

impl CountingRepository {
    fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReadRepository for CountingRepository {
    async fn get(&self, id: &ShortId) -> shortbin_core::repository::Result<Option<UrlRecord>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.get(id).await
    }

    async fn exists(&self, id: &ShortId) -> shortbin_core::repository::Result<bool> {
        self.inner.exists(id).await
    }
}

struct FailingRepository;

#[async_trait]
impl ReadRepository for FailingRepository {
    async fn get(&self, _id: &ShortId) -> shortbin_core::repository::Result<Option<UrlRecord>> {
        Err(StorageError::Unavailable("connection refused".to_string()))
    }

    async fn exists(&self, _id: &ShortId) -> shortbin_core::repository::Result<bool> {
        Err(StorageError::Unavailable("connection refused".to_string()))
    }
}

/// Counts calls against a Moka cache and remembers the last TTL written.
#[derive(Default)]
struct CountingCache {
    inner: MokaReadCache,
    reads: AtomicUsize,
    sets: AtomicUsize,
    last_set_ttl: Mutex<Option<Duration>>,
}

impl CountingCache {
    fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn sets(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReadCache for CountingCache {
    async fn get(&self, key: &str) -> shortbin_core::cache::Result<Option<String>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key).await
    }

    async fn get_refreshing_expiry(
        &self,
        key: &str,
        ttl: Duration,
    ) -> shortbin_core::cache::Result<Option<String>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.get_refreshing_expiry(key, ttl).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> shortbin_core::cache::Result<()> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        *self.last_set_ttl.lock().unwrap() = Some(ttl);
        self.inner.set(key, value, ttl).await
    }

    async fn set_expiry(&self, key: &str, ttl: Duration) -> shortbin_core::cache::Result<bool> {
        self.inner.set_expiry(key, ttl).await
    }
}

struct FailingCache;

#[async_trait]
impl ReadCache for FailingCache {
    async fn get(&self, _key: &str) -> shortbin_core::cache::Result<Option<String>> {
        Err(CacheError::Unavailable("redis down".to_string()))
    }

    async fn get_refreshing_expiry(
        &self,
        _key: &str,
        _ttl: Duration,
    ) -> shortbin_core::cache::Result<Option<String>> {
        Err(CacheError::Timeout("get exceeded 3s".to_string()))
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> shortbin_core::cache::Result<()> {
        Err(CacheError::Unavailable("redis down".to_string()))
    }

    async fn set_expiry(&self, _key: &str, _ttl: Duration) -> shortbin_core::cache::Result<bool> {
        Err(CacheError::Unavailable("redis down".to_string()))
    }
}

#[derive(Default)]
struct FailingSink {
    attempts: AtomicUsize,
}

#[async_trait]
impl EventSink for FailingSink {
    async fn publish(&self, _topic: Topic, _event: AccessEvent) -> shortbin_core::events::Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(EventError::Unavailable("broker down".to_string()))
    }
}

fn record(id: &str, url: &str, owner: Option<&str>) -> UrlRecord {
    let now = Timestamp::now();
    UrlRecord {
        short_id: ShortId::new_unchecked(id),
        long_url: url.to_string(),
        owner_id: owner.map(str::to_string),
        created_at: now,
        expires_at: now + SignedDuration::from_hours(24),
    }
}

fn settings() -> ResolverSettings {
    ResolverSettings::builder()
        .policy(ShortIdPolicy::new(6, 6, 8).unwrap())
        .build()
}

fn meta() -> RequestMeta {
    RequestMeta {
        ip_address: "10.0.0.7".to_string(),
        user_agent: "curl/8.5".to_string(),
        referer: "https://news.example".to_string(),
        forwarded_for: "198.51.100.4".to_string(),
        request_host: "sho.rt".to_string(),
    }
}

type TestResolver = RedirectResolver<Arc<CountingRepository>, Arc<CountingCache>, Arc<MemorySink>>;

struct Harness {
    repo: Arc<CountingRepository>,
    cache: Arc<CountingCache>,
    sink: Arc<MemorySink>,
    resolver: TestResolver,
}

impl Harness {
    async fn with_records(records: Vec<UrlRecord>, settings: ResolverSettings) -> Self {
        Self::with_repo(CountingRepository::default(), records, settings).await
    }

    async fn with_repo(
        repo: CountingRepository,
        records: Vec<UrlRecord>,
        settings: ResolverSettings,
    ) -> Self {
        for rec in records {
            repo.inner.insert(rec).await.unwrap();
        }
        let repo = Arc::new(repo);
        let cache = Arc::new(CountingCache::default());
        let sink = Arc::new(MemorySink::new());
        let resolver = RedirectResolver::new(
            Arc::clone(&repo),
            Arc::clone(&cache),
            Arc::clone(&sink),
            settings,
        );
        Self {
            repo,
            cache,
            sink,
            resolver,
        }
    }

    async fn wait_for_cached(&self, key: &str) {
        awaitility::at_most(Duration::from_secs(2))
            .poll_interval(Duration::from_millis(5))
            .until_async(|| async { self.cache.inner.get(key).await.unwrap().is_some() })
            .await;
    }

    async fn wait_for_events(&self, count: usize) {
        awaitility::at_most(Duration::from_secs(2))
            .poll_interval(Duration::from_millis(5))
            .until_async(|| async { self.sink.len().await >= count })
            .await;
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn miss_then_hit_skips_storage() {
    let h = Harness::with_records(vec![record("abc123", "https://example.com", None)], settings())
        .await;

    let first = h.resolver.resolve("abc123", meta()).await.unwrap();
    assert_eq!(first.long_url, "https://example.com");
    assert!(!first.cache_hit);
    assert_eq!(h.repo.gets(), 1);

    h.wait_for_cached("abc123").await;

    let second = h.resolver.resolve("abc123", meta()).await.unwrap();
    assert_eq!(second.long_url, "https://example.com");
    assert!(second.cache_hit);
    assert_eq!(h.repo.gets(), 1, "a cache hit must not read storage");

    h.wait_for_events(2).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn repeated_hits_never_read_storage() {
    let h = Harness::with_records(vec![record("abc123", "https://example.com", None)], settings())
        .await;

    h.resolver.resolve("abc123", meta()).await.unwrap();
    h.wait_for_cached("abc123").await;

    for _ in 0..10 {
        let hit = h.resolver.resolve("abc123", meta()).await.unwrap();
        assert!(hit.cache_hit);
    }
    assert_eq!(h.repo.gets(), 1);
}

#[tokio::test]
async fn out_of_range_id_touches_no_backend() {
    let h = Harness::with_records(vec![], settings()).await;

    for raw in ["zz", "", "abcdefghi", "abc-12"] {
        let err = h.resolver.resolve(raw, meta()).await.unwrap_err();
        assert!(
            matches!(err, RedirectError::InvalidIdentifier(_)),
            "{raw:?} gave {err:?}"
        );
    }

    assert_eq!(h.repo.gets(), 0);
    assert_eq!(h.cache.reads(), 0);
    assert_eq!(h.sink.len().await, 0);
}

#[tokio::test]
async fn unknown_id_is_not_found() {
    let h = Harness::with_records(vec![], settings()).await;

    let err = h.resolver.resolve("nope00", meta()).await.unwrap_err();
    assert!(matches!(err, RedirectError::NotFound));
    assert_eq!(h.repo.gets(), 1);

    // Nothing to cache and nothing to record.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.cache.sets(), 0);
    assert_eq!(h.sink.len().await, 0);
}

#[tokio::test]
async fn expired_record_is_not_found_and_not_cached() {
    let mut rec = record("old123", "https://example.com", None);
    rec.expires_at = Timestamp::now() - SignedDuration::from_secs(1);
    let h = Harness::with_records(vec![rec], settings()).await;

    let err = h.resolver.resolve("old123", meta()).await.unwrap_err();
    assert!(matches!(err, RedirectError::NotFound));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.cache.sets(), 0);
}

#[tokio::test]
async fn expired_cache_entry_is_not_found() {
    let h = Harness::with_records(vec![], settings()).await;
    let stale = CachedTarget {
        owner: None,
        url: "https://example.com".to_string(),
        expires_at: Some(Timestamp::now() - SignedDuration::from_secs(5)),
    };
    h.cache
        .inner
        .set("old123", &stale.encode().unwrap(), Duration::from_secs(60))
        .await
        .unwrap();

    let err = h.resolver.resolve("old123", meta()).await.unwrap_err();
    assert!(matches!(err, RedirectError::NotFound));
    assert_eq!(h.repo.gets(), 0);
}

#[tokio::test]
async fn storage_failure_is_internal() {
    let resolver = RedirectResolver::new(
        FailingRepository,
        MokaReadCache::new(),
        MemorySink::new(),
        settings(),
    );

    let err = resolver.resolve("abc123", meta()).await.unwrap_err();
    assert!(matches!(err, RedirectError::Internal(_)));
}

#[tokio::test]
async fn cache_outage_falls_back_to_storage() {
    let repo = InMemoryRepository::new();
    repo.insert(record("abc123", "https://example.com", None))
        .await
        .unwrap();
    let sink = Arc::new(MemorySink::new());
    let resolver = RedirectResolver::new(repo, FailingCache, Arc::clone(&sink), settings());

    for _ in 0..3 {
        let resolved = resolver.resolve("abc123", meta()).await.unwrap();
        assert_eq!(resolved.long_url, "https://example.com");
        assert!(!resolved.cache_hit);
    }

    awaitility::at_most(Duration::from_secs(2))
        .poll_interval(Duration::from_millis(5))
        .until_async(|| async { sink.len().await == 3 })
        .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn publish_failures_do_not_fail_resolution() {
    let repo = InMemoryRepository::new();
    repo.insert(record("abc123", "https://example.com", Some("user-1")))
        .await
        .unwrap();
    let sink = Arc::new(FailingSink::default());
    let resolver = RedirectResolver::new(repo, MokaReadCache::new(), Arc::clone(&sink), settings());

    let resolved = resolver.resolve("abc123", meta()).await.unwrap();
    assert_eq!(resolved.owner.as_deref(), Some("user-1"));

    awaitility::at_most(Duration::from_secs(2))
        .poll_interval(Duration::from_millis(5))
        .until_async(|| async { sink.attempts.load(Ordering::SeqCst) == 1 })
        .await;
}

#[tokio::test]
async fn events_are_partitioned_by_owner() {
    let h = Harness::with_records(
        vec![
            record("own123", "https://owned.example", Some("user-1")),
            record("anon12", "https://anon.example", None),
        ],
        settings(),
    )
    .await;

    h.resolver.resolve("own123", meta()).await.unwrap();
    h.resolver.resolve("anon12", meta()).await.unwrap();
    h.wait_for_events(2).await;

    let attributed = h.sink.on_topic(Topic::Attributed).await;
    assert_eq!(attributed.len(), 1);
    assert_eq!(attributed[0].short_id, "own123");
    assert_eq!(attributed[0].short_created_by, "user-1");
    assert_eq!(attributed[0].partition_key(), "own123");
    assert_eq!(attributed[0].user_agent, "curl/8.5");
    assert_eq!(attributed[0].x_forwarded_for, "198.51.100.4");

    let public = h.sink.on_topic(Topic::Public).await;
    assert_eq!(public.len(), 1);
    assert_eq!(public[0].short_created_by, "-1");
}

#[tokio::test(flavor = "multi_thread")]
async fn owner_survives_the_cache() {
    let h = Harness::with_records(
        vec![record("own123", "https://owned.example", Some("user-1"))],
        settings(),
    )
    .await;

    h.resolver.resolve("own123", meta()).await.unwrap();
    h.wait_for_cached("own123").await;

    let hit = h.resolver.resolve("own123", meta()).await.unwrap();
    assert!(hit.cache_hit);
    assert_eq!(hit.owner.as_deref(), Some("user-1"));

    h.wait_for_events(2).await;
    assert_eq!(h.sink.on_topic(Topic::Attributed).await.len(), 2);
}

#[tokio::test]
async fn legacy_cache_values_are_understood() {
    let h = Harness::with_records(vec![], settings()).await;
    let ttl = Duration::from_secs(60);
    h.cache
        .inner
        .set("leg123", "user-9;https://legacy.example/a;b", ttl)
        .await
        .unwrap();
    h.cache
        .inner
        .set("plain1", "https://plain.example", ttl)
        .await
        .unwrap();

    let composite = h.resolver.resolve("leg123", meta()).await.unwrap();
    assert_eq!(composite.long_url, "https://legacy.example/a;b");
    assert_eq!(composite.owner.as_deref(), Some("user-9"));

    let plain = h.resolver.resolve("plain1", meta()).await.unwrap();
    assert_eq!(plain.long_url, "https://plain.example");
    assert_eq!(plain.owner, None);

    h.wait_for_events(2).await;
    assert_eq!(h.sink.on_topic(Topic::Attributed).await.len(), 1);
    assert_eq!(h.sink.on_topic(Topic::Public).await.len(), 1);
    assert_eq!(h.repo.gets(), 0);
}

#[tokio::test]
async fn unreadable_cache_value_falls_back_to_storage() {
    let h = Harness::with_records(vec![record("abc123", "https://example.com", None)], settings())
        .await;
    h.cache
        .inner
        .set("abc123", "{broken", Duration::from_secs(60))
        .await
        .unwrap();

    let resolved = h.resolver.resolve("abc123", meta()).await.unwrap();
    assert_eq!(resolved.long_url, "https://example.com");
    assert_eq!(h.repo.gets(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn cache_population_is_idempotent() {
    let rec = record("abc123", "https://example.com", Some("user-1"));
    let h = Harness::with_records(vec![rec.clone()], settings()).await;
    let expected = CachedTarget::from(&rec);

    for _ in 0..3 {
        h.resolver.resolve("abc123", meta()).await.unwrap();
        h.wait_for_cached("abc123").await;

        let raw = h.cache.inner.get("abc123").await.unwrap().unwrap();
        assert_eq!(CachedTarget::decode(&raw), Some(expected.clone()));

        // Force the next resolution back to storage.
        h.cache
            .inner
            .set_expiry("abc123", Duration::from_millis(1))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let stored = h.repo.inner.get(&rec.short_id).await.unwrap();
    assert_eq!(stored, Some(rec));
}

#[tokio::test(flavor = "multi_thread")]
async fn sliding_expiry_keeps_hot_entries() {
    let settings = ResolverSettings::builder()
        .policy(ShortIdPolicy::new(6, 6, 8).unwrap())
        .cache_ttl(Duration::from_millis(300))
        .build();
    let h = Harness::with_records(vec![record("abc123", "https://example.com", None)], settings)
        .await;

    h.resolver.resolve("abc123", meta()).await.unwrap();
    h.wait_for_cached("abc123").await;

    // Each gap is shorter than the TTL but their sum is well past it.
    for _ in 0..6 {
        tokio::time::sleep(Duration::from_millis(150)).await;
        let hit = h.resolver.resolve("abc123", meta()).await.unwrap();
        assert!(hit.cache_hit);
    }
    assert_eq!(h.repo.gets(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn cache_ttl_is_capped_by_link_expiry() {
    let mut rec = record("soon12", "https://example.com", None);
    rec.expires_at = Timestamp::now() + SignedDuration::from_secs(2);
    let h = Harness::with_records(vec![rec], settings()).await;

    h.resolver.resolve("soon12", meta()).await.unwrap();
    h.wait_for_cached("soon12").await;

    let ttl = h.cache.last_set_ttl.lock().unwrap().unwrap();
    assert!(ttl <= Duration::from_secs(2), "ttl was {ttl:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_misses_share_a_lookup_when_coalescing() {
    let settings = ResolverSettings::builder()
        .policy(ShortIdPolicy::new(6, 6, 8).unwrap())
        .coalesce_misses(true)
        .build();
    let h = Arc::new(
        Harness::with_repo(
            CountingRepository::slow(Duration::from_millis(150)),
            vec![record("abc123", "https://example.com", None)],
            settings,
        )
        .await,
    );

    let mut handles = Vec::new();
    for _ in 0..10 {
        let h = Arc::clone(&h);
        handles.push(tokio::spawn(async move {
            h.resolver.resolve("abc123", meta()).await
        }));
    }
    for handle in handles {
        let resolved = handle.await.unwrap().unwrap();
        assert_eq!(resolved.long_url, "https://example.com");
    }

    assert_eq!(h.repo.gets(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_misses_each_read_storage_by_default() {
    let h = Arc::new(
        Harness::with_repo(
            CountingRepository::slow(Duration::from_millis(150)),
            vec![record("abc123", "https://example.com", None)],
            settings(),
        )
        .await,
    );

    let mut handles = Vec::new();
    for _ in 0..10 {
        let h = Arc::clone(&h);
        handles.push(tokio::spawn(async move {
            h.resolver.resolve("abc123", meta()).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert!(h.repo.gets() > 1);
}
