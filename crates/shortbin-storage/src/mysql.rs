use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use jiff::Timestamp;
use shortbin_core::repository::{ReadRepository, Repository, Result, UserRepository};
use shortbin_core::{ShortId, StorageError, UrlRecord, UserRecord};
use sqlx::mysql::{MySqlPoolOptions, MySqlRow};
use sqlx::{MySqlPool, Row};
use typed_builder::TypedBuilder;

pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(3);

/// Connection settings for [`MySqlRepository`].
#[derive(Debug, Clone, TypedBuilder)]
pub struct MySqlSettings {
    #[builder(setter(into))]
    pub database_url: String,
    #[builder(default = DEFAULT_MAX_CONNECTIONS)]
    pub max_connections: u32,
    /// Upper bound on a single query, including waiting for a pooled connection.
    #[builder(default = DEFAULT_QUERY_TIMEOUT)]
    pub query_timeout: Duration,
}

/// MySQL implementation of the URL and account stores.
///
/// Rows are returned as stored, expired or not. Expiry is a read-path
/// decision and belongs to the resolver. Timestamps are kept as unix seconds.
#[derive(Debug, Clone)]
pub struct MySqlRepository {
    pool: MySqlPool,
    query_timeout: Duration,
}

impl MySqlRepository {
    /// Creates a repository from an existing MySQL connection pool.
    pub fn new(pool: MySqlPool) -> Self {
        Self {
            pool,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Creates a repository by opening a new MySQL connection pool.
    pub async fn connect(settings: &MySqlSettings) -> Result<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(settings.query_timeout)
            .connect(&settings.database_url)
            .await
            .map_err(map_sqlx_error)?;

        tracing::info!(
            max_connections = settings.max_connections,
            "connected to mysql"
        );

        Ok(Self::new(pool).with_query_timeout(settings.query_timeout))
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout(self.query_timeout, fut).await {
            Ok(result) => result.map_err(map_sqlx_error),
            Err(_) => Err(StorageError::Timeout(format!(
                "{op} exceeded {:?}",
                self.query_timeout
            ))),
        }
    }
}

fn parse_timestamp(column: &str, seconds: i64) -> Result<Timestamp> {
    Timestamp::from_second(seconds).map_err(|e| {
        StorageError::InvalidData(format!("invalid {column} timestamp '{seconds}': {e}"))
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation)
}

fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StorageError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::RowNotFound => StorageError::InvalidData(message),
        _ => StorageError::Query(message),
    }
}

fn url_from_row(row: &MySqlRow) -> Result<UrlRecord> {
    let short_id: String = row.try_get("short_id").map_err(map_sqlx_error)?;
    let long_url: String = row.try_get("long_url").map_err(map_sqlx_error)?;
    let owner_id: Option<String> = row.try_get("user_id").map_err(map_sqlx_error)?;
    let created_at: i64 = row.try_get("created_at").map_err(map_sqlx_error)?;
    let expires_at: i64 = row.try_get("expires_at").map_err(map_sqlx_error)?;

    Ok(UrlRecord {
        short_id: ShortId::new_unchecked(short_id),
        long_url,
        owner_id,
        created_at: parse_timestamp("created_at", created_at)?,
        expires_at: parse_timestamp("expires_at", expires_at)?,
    })
}

fn user_from_row(row: &MySqlRow) -> Result<UserRecord> {
    let created_at: i64 = row.try_get("created_at").map_err(map_sqlx_error)?;

    Ok(UserRecord {
        id: row.try_get("id").map_err(map_sqlx_error)?,
        email: row.try_get("email").map_err(map_sqlx_error)?,
        password_hash: row.try_get("password_hash").map_err(map_sqlx_error)?,
        created_at: parse_timestamp("created_at", created_at)?,
    })
}

#[async_trait]
impl ReadRepository for MySqlRepository {
    async fn get(&self, id: &ShortId) -> Result<Option<UrlRecord>> {
        let row = self
            .bounded(
                "get url",
                sqlx::query(
                    r#"
                    SELECT short_id, long_url, user_id, created_at, expires_at
                    FROM urls
                    WHERE short_id = ?
                    LIMIT 1
                    "#,
                )
                .bind(id.as_str())
                .fetch_optional(&self.pool),
            )
            .await?;

        row.as_ref().map(url_from_row).transpose()
    }

    async fn exists(&self, id: &ShortId) -> Result<bool> {
        let row = self
            .bounded(
                "url exists",
                sqlx::query(
                    r#"
                    SELECT 1
                    FROM urls
                    WHERE short_id = ?
                    LIMIT 1
                    "#,
                )
                .bind(id.as_str())
                .fetch_optional(&self.pool),
            )
            .await?;

        Ok(row.is_some())
    }
}

#[async_trait]
impl Repository for MySqlRepository {
    async fn insert(&self, record: UrlRecord) -> Result<()> {
        let result = tokio::time::timeout(
            self.query_timeout,
            sqlx::query(
                r#"
                INSERT INTO urls (short_id, long_url, user_id, created_at, expires_at)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(record.short_id.as_str())
            .bind(&record.long_url)
            .bind(record.owner_id.as_deref())
            .bind(record.created_at.as_second())
            .bind(record.expires_at.as_second())
            .execute(&self.pool),
        )
        .await
        .map_err(|_| StorageError::Timeout(format!("insert url exceeded {:?}", self.query_timeout)))?;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => {
                Err(StorageError::Conflict(record.short_id.to_string()))
            }
            Err(err) => Err(map_sqlx_error(err)),
        }
    }
}

#[async_trait]
impl UserRepository for MySqlRepository {
    async fn create(&self, user: &UserRecord) -> Result<()> {
        let result = tokio::time::timeout(
            self.query_timeout,
            sqlx::query(
                r#"
                INSERT INTO users (id, email, password_hash, created_at)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(&user.id)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.created_at.as_second())
            .execute(&self.pool),
        )
        .await
        .map_err(|_| StorageError::Timeout(format!("create user exceeded {:?}", self.query_timeout)))?;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Err(StorageError::Conflict(user.email.clone())),
            Err(err) => Err(map_sqlx_error(err)),
        }
    }

    async fn update_password(&self, id: &str, password_hash: &str) -> Result<bool> {
        let result = self
            .bounded(
                "update password",
                sqlx::query(
                    r#"
                    UPDATE users
                    SET password_hash = ?
                    WHERE id = ?
                    "#,
                )
                .bind(password_hash)
                .bind(id)
                .execute(&self.pool),
            )
            .await?;

        // MySQL reports matched-but-unchanged rows as 0 affected, so fall
        // back to an existence check when the hash did not change.
        if result.rows_affected() > 0 {
            return Ok(true);
        }
        Ok(self.get_by_id(id).await?.is_some())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<UserRecord>> {
        let row = self
            .bounded(
                "get user by id",
                sqlx::query(
                    r#"
                    SELECT id, email, password_hash, created_at
                    FROM users
                    WHERE id = ?
                    LIMIT 1
                    "#,
                )
                .bind(id)
                .fetch_optional(&self.pool),
            )
            .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let row = self
            .bounded(
                "get user by email",
                sqlx::query(
                    r#"
                    SELECT id, email, password_hash, created_at
                    FROM users
                    WHERE email = ?
                    LIMIT 1
                    "#,
                )
                .bind(email)
                .fetch_optional(&self.pool),
            )
            .await?;

        row.as_ref().map(user_from_row).transpose()
    }
}
