mod cli;
mod telemetry;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use jiff::SignedDuration;
use secrecy::ExposeSecret;
use shortbin_auth::{AuthService, PasswordHasher, TokenService, TokenSettings};
use shortbin_cache::redis::DEFAULT_KEY_PREFIX;
use shortbin_cache::{MokaReadCache, ReadCache, RedisReadCache, TimeoutCache};
use shortbin_core::{Repository, ShortIdPolicy, UserRepository};
use shortbin_events::{MemorySink, NullSink, QueuedSink, RedisStreamSettings, RedisStreamSink};
use shortbin_gateway::{App, AppState, Environment};
use shortbin_generator::{Generator, RandomGenerator};
use shortbin_redirector::{RedirectResolver, ResolverSettings};
use shortbin_shortener::{ShortenerService, ShortenerSettings};
use shortbin_storage::{InMemoryRepository, InMemoryUserRepository, MySqlRepository, MySqlSettings};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::cli::{CacheBackendArg, EventBackendArg, StorageBackendArg, CLI, DEFAULT_JWT_SECRET};

/// How long queued events get to drain on shutdown.
const EVENT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CLI::parse();
    telemetry::init(config.log_format)?;

    let environment = Environment::from_name(&config.environment);
    if environment.is_production() && config.jwt_secret.expose_secret() == DEFAULT_JWT_SECRET {
        anyhow::bail!("a JWT secret must be configured in production");
    }

    info!(
        listen_addr = %config.listen_addr,
        environment = %environment,
        storage_backend = %config.storage,
        cache_backend = %config.cache,
        event_backend = %config.events,
        "starting shortbin gateway"
    );

    let policy = ShortIdPolicy::new(
        config.short_id_length,
        config.short_id_min_length,
        config.short_id_max_length,
    )?;

    let (urls, users) = storage(&config).await?;
    let cache = cache(&config).await?;
    let (events, event_worker) = events(&config).await?;

    let redirector = RedirectResolver::new(
        Arc::clone(&urls),
        cache,
        events,
        ResolverSettings::builder()
            .policy(policy)
            .cache_ttl(Duration::from_secs(config.cache_ttl_minutes.saturating_mul(60)))
            .coalesce_misses(config.coalesce_misses)
            .build(),
    );

    let generator = RandomGenerator::from_policy(&policy);
    anyhow::ensure!(
        generator.length() == policy.length(),
        "generator length {} does not match the short id policy",
        generator.length()
    );
    let link_lifetime = config
        .link_lifetime_days
        .checked_mul(24)
        .map(SignedDuration::from_hours)
        .context("link lifetime is out of range")?;
    let shortener = ShortenerService::new(
        urls,
        generator,
        ShortenerSettings::builder()
            .link_lifetime(link_lifetime)
            .build(),
    );

    let tokens = TokenService::new(
        TokenSettings::builder()
            .secret(config.jwt_secret.clone())
            .build(),
    );
    let accounts = AuthService::new(users, tokens, PasswordHasher::new());

    let state = AppState::new(
        Arc::new(redirector),
        Arc::new(shortener),
        Arc::new(accounts),
        environment,
    );

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    info!(listen_addr = %listener.local_addr()?, "listening");

    axum::serve(
        listener,
        App::router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    // The router and its queue sender are gone; let the worker flush.
    match tokio::time::timeout(EVENT_DRAIN_TIMEOUT, event_worker).await {
        Ok(Ok(())) => info!("event queue drained"),
        Ok(Err(e)) => warn!(error = %e, "event worker failed"),
        Err(_) => warn!("event queue did not drain in time"),
    }

    Ok(())
}

async fn storage(
    config: &CLI,
) -> anyhow::Result<(Arc<dyn Repository>, Arc<dyn UserRepository>)> {
    match config.storage {
        StorageBackendArg::InMemory => {
            let urls: Arc<dyn Repository> = Arc::new(InMemoryRepository::new());
            let users: Arc<dyn UserRepository> = Arc::new(InMemoryUserRepository::new());
            Ok((urls, users))
        }
        StorageBackendArg::Mysql => {
            let dsn = config
                .mysql_dsn
                .as_deref()
                .context("mysql dsn is required when storage backend is mysql")?;
            let settings = MySqlSettings::builder()
                .database_url(dsn)
                .max_connections(config.mysql_max_connections)
                .query_timeout(Duration::from_millis(config.mysql_query_timeout_ms))
                .build();
            let repository = Arc::new(MySqlRepository::connect(&settings).await?);
            let urls: Arc<dyn Repository> = repository.clone();
            let users: Arc<dyn UserRepository> = repository;
            Ok((urls, users))
        }
    }
}

async fn cache(config: &CLI) -> anyhow::Result<Arc<dyn ReadCache>> {
    let timeout = Duration::from_millis(config.cache_timeout_ms);
    let cache: Arc<dyn ReadCache> = match config.cache {
        CacheBackendArg::InMemory => Arc::new(TimeoutCache::new(
            MokaReadCache::with_capacity(config.cache_capacity),
            timeout,
        )),
        CacheBackendArg::Redis => {
            let redis = RedisReadCache::connect(&config.redis_url, DEFAULT_KEY_PREFIX).await?;
            Arc::new(TimeoutCache::new(redis, timeout))
        }
    };
    Ok(cache)
}

async fn events(config: &CLI) -> anyhow::Result<(QueuedSink, JoinHandle<()>)> {
    let capacity = config.event_queue_capacity;
    let queued = match config.events {
        EventBackendArg::None => QueuedSink::spawn(NullSink, capacity),
        EventBackendArg::InMemory => QueuedSink::spawn(MemorySink::new(), capacity),
        EventBackendArg::Redis => {
            let sink =
                RedisStreamSink::connect(&config.redis_url, RedisStreamSettings::default()).await?;
            QueuedSink::spawn(sink, capacity)
        }
    };
    Ok(queued)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
