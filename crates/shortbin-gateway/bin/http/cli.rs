use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;

use clap::{Parser, ValueEnum};
use secrecy::SecretString;

pub const LISTEN_ADDR_ENV: &str = "SHORTBIN_LISTEN_ADDR";
pub const ENVIRONMENT_ENV: &str = "SHORTBIN_ENVIRONMENT";
pub const LOG_FORMAT_ENV: &str = "SHORTBIN_LOG_FORMAT";
pub const STORAGE_BACKEND_ENV: &str = "SHORTBIN_STORAGE_BACKEND";
pub const MYSQL_DSN_ENV: &str = "SHORTBIN_MYSQL_DSN";
pub const MYSQL_MAX_CONNECTIONS_ENV: &str = "SHORTBIN_MYSQL_MAX_CONNECTIONS";
pub const MYSQL_QUERY_TIMEOUT_MS_ENV: &str = "SHORTBIN_MYSQL_QUERY_TIMEOUT_MS";
pub const CACHE_BACKEND_ENV: &str = "SHORTBIN_CACHE_BACKEND";
pub const EVENT_BACKEND_ENV: &str = "SHORTBIN_EVENT_BACKEND";
pub const REDIS_URL_ENV: &str = "SHORTBIN_REDIS_URL";
pub const CACHE_TTL_MINUTES_ENV: &str = "SHORTBIN_CACHE_TTL_MINUTES";
pub const CACHE_TIMEOUT_MS_ENV: &str = "SHORTBIN_CACHE_TIMEOUT_MS";
pub const CACHE_CAPACITY_ENV: &str = "SHORTBIN_CACHE_CAPACITY";
pub const COALESCE_MISSES_ENV: &str = "SHORTBIN_COALESCE_MISSES";
pub const SHORT_ID_LENGTH_ENV: &str = "SHORTBIN_SHORT_ID_LENGTH";
pub const SHORT_ID_MIN_LENGTH_ENV: &str = "SHORTBIN_SHORT_ID_MIN_LENGTH";
pub const SHORT_ID_MAX_LENGTH_ENV: &str = "SHORTBIN_SHORT_ID_MAX_LENGTH";
pub const LINK_LIFETIME_DAYS_ENV: &str = "SHORTBIN_LINK_LIFETIME_DAYS";
pub const EVENT_QUEUE_CAPACITY_ENV: &str = "SHORTBIN_EVENT_QUEUE_CAPACITY";
pub const JWT_SECRET_ENV: &str = "SHORTBIN_JWT_SECRET";

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_ENVIRONMENT: &str = "development";
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
pub const DEFAULT_MYSQL_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_MYSQL_QUERY_TIMEOUT_MS: u64 = 3_000;
pub const DEFAULT_CACHE_TTL_MINUTES: u64 = 60;
pub const DEFAULT_CACHE_TIMEOUT_MS: u64 = 3_000;
pub const DEFAULT_CACHE_CAPACITY: u64 = 100_000;
pub const DEFAULT_SHORT_ID_LENGTH: usize = 7;
pub const DEFAULT_SHORT_ID_MIN_LENGTH: usize = 6;
pub const DEFAULT_SHORT_ID_MAX_LENGTH: usize = 8;
pub const DEFAULT_LINK_LIFETIME_DAYS: i64 = 365;
pub const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 1_024;
/// Development-only signing key. Refused in production.
pub const DEFAULT_JWT_SECRET: &str = "shortbin-development-secret";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackendArg {
    #[value(name = "in-memory")]
    InMemory,
    #[value(name = "mysql")]
    Mysql,
}

impl Display for StorageBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackendArg::InMemory => write!(f, "in-memory"),
            StorageBackendArg::Mysql => write!(f, "mysql"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CacheBackendArg {
    #[value(name = "in-memory")]
    InMemory,
    #[value(name = "redis")]
    Redis,
}

impl Display for CacheBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheBackendArg::InMemory => write!(f, "in-memory"),
            CacheBackendArg::Redis => write!(f, "redis"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EventBackendArg {
    /// Drop events after logging them.
    #[value(name = "none")]
    None,
    /// Keep events in process memory.
    #[value(name = "in-memory")]
    InMemory,
    #[value(name = "redis")]
    Redis,
}

impl Display for EventBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            EventBackendArg::None => write!(f, "none"),
            EventBackendArg::InMemory => write!(f, "in-memory"),
            EventBackendArg::Redis => write!(f, "redis"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    #[value(name = "text")]
    Text,
    #[value(name = "json")]
    Json,
}

fn parse_secret(raw: &str) -> Result<SecretString, Infallible> {
    Ok(SecretString::from(raw))
}

#[derive(Debug, Parser)]
#[command(name = "shortbin")]
pub struct CLI {
    #[arg(long, env = LISTEN_ADDR_ENV, default_value = DEFAULT_LISTEN_ADDR)]
    pub listen_addr: SocketAddr,

    /// `production` hides debug detail in error bodies.
    #[arg(long, env = ENVIRONMENT_ENV, default_value = DEFAULT_ENVIRONMENT)]
    pub environment: String,

    #[arg(long, env = LOG_FORMAT_ENV, value_enum, default_value_t = LogFormatArg::Text)]
    pub log_format: LogFormatArg,

    #[arg(
        long,
        env = STORAGE_BACKEND_ENV,
        value_enum,
        default_value_t = StorageBackendArg::InMemory
    )]
    pub storage: StorageBackendArg,

    #[arg(long, env = MYSQL_DSN_ENV, required_if_eq("storage", "mysql"))]
    pub mysql_dsn: Option<String>,

    #[arg(
        long,
        env = MYSQL_MAX_CONNECTIONS_ENV,
        default_value_t = DEFAULT_MYSQL_MAX_CONNECTIONS,
        value_parser = clap::value_parser!(u32).range(1..=1_000)
    )]
    pub mysql_max_connections: u32,

    #[arg(
        long,
        env = MYSQL_QUERY_TIMEOUT_MS_ENV,
        default_value_t = DEFAULT_MYSQL_QUERY_TIMEOUT_MS,
        value_parser = clap::value_parser!(u64).range(1..=600_000)
    )]
    pub mysql_query_timeout_ms: u64,

    #[arg(
        long,
        env = CACHE_BACKEND_ENV,
        value_enum,
        default_value_t = CacheBackendArg::InMemory
    )]
    pub cache: CacheBackendArg,

    #[arg(
        long,
        env = EVENT_BACKEND_ENV,
        value_enum,
        default_value_t = EventBackendArg::None
    )]
    pub events: EventBackendArg,

    #[arg(long, env = REDIS_URL_ENV, default_value = DEFAULT_REDIS_URL)]
    pub redis_url: String,

    /// At most 30 days.
    #[arg(
        long,
        env = CACHE_TTL_MINUTES_ENV,
        default_value_t = DEFAULT_CACHE_TTL_MINUTES,
        value_parser = clap::value_parser!(u64).range(1..=43_200)
    )]
    pub cache_ttl_minutes: u64,

    #[arg(long, env = CACHE_TIMEOUT_MS_ENV, default_value_t = DEFAULT_CACHE_TIMEOUT_MS)]
    pub cache_timeout_ms: u64,

    /// Entry bound for the in-memory cache.
    #[arg(long, env = CACHE_CAPACITY_ENV, default_value_t = DEFAULT_CACHE_CAPACITY)]
    pub cache_capacity: u64,

    #[arg(long, env = COALESCE_MISSES_ENV, default_value_t = false)]
    pub coalesce_misses: bool,

    #[arg(long, env = SHORT_ID_LENGTH_ENV, default_value_t = DEFAULT_SHORT_ID_LENGTH)]
    pub short_id_length: usize,

    #[arg(long, env = SHORT_ID_MIN_LENGTH_ENV, default_value_t = DEFAULT_SHORT_ID_MIN_LENGTH)]
    pub short_id_min_length: usize,

    #[arg(long, env = SHORT_ID_MAX_LENGTH_ENV, default_value_t = DEFAULT_SHORT_ID_MAX_LENGTH)]
    pub short_id_max_length: usize,

    /// At most 100 years.
    #[arg(
        long,
        env = LINK_LIFETIME_DAYS_ENV,
        default_value_t = DEFAULT_LINK_LIFETIME_DAYS,
        value_parser = clap::value_parser!(i64).range(1..=36_500)
    )]
    pub link_lifetime_days: i64,

    #[arg(
        long,
        env = EVENT_QUEUE_CAPACITY_ENV,
        default_value_t = DEFAULT_EVENT_QUEUE_CAPACITY
    )]
    pub event_queue_capacity: usize,

    #[arg(
        long,
        env = JWT_SECRET_ENV,
        hide_env_values = true,
        hide_default_value = true,
        default_value = DEFAULT_JWT_SECRET,
        value_parser = parse_secret
    )]
    pub jwt_secret: SecretString,
}
