use crate::error::StorageError;
use crate::short_id::ShortId;
use async_trait::async_trait;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// A stored URL mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlRecord {
    pub short_id: ShortId,
    /// The original URL that was shortened.
    pub long_url: String,
    /// Account that created the link, `None` for anonymous links.
    pub owner_id: Option<String>,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
}

impl UrlRecord {
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }
}

/// A stored account with its password hash.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: Timestamp,
}

impl std::fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserRecord")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("password_hash", &"[REDACTED]")
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// A read-only view of the URL store.
///
/// The redirect path only ever needs this half of [`Repository`].
#[async_trait]
pub trait ReadRepository: Send + Sync + 'static {
    /// Retrieves the URL record for a given short id.
    /// Returns `None` if the id does not exist.
    async fn get(&self, id: &ShortId) -> Result<Option<UrlRecord>>;

    /// Checks whether a short id already exists.
    async fn exists(&self, id: &ShortId) -> Result<bool>;
}

#[async_trait]
pub trait Repository: ReadRepository {
    /// Inserts a new URL record. Returns `Err(Conflict)` if the id already exists.
    async fn insert(&self, record: UrlRecord) -> Result<()>;
}

/// Persistence for accounts.
#[async_trait]
pub trait UserRepository: Send + Sync + 'static {
    /// Inserts a new account. Returns `Err(Conflict)` if the email is taken.
    async fn create(&self, user: &UserRecord) -> Result<()>;

    /// Replaces the password hash of an account.
    /// Returns `false` if no account has this id.
    async fn update_password(&self, id: &str, password_hash: &str) -> Result<bool>;

    async fn get_by_id(&self, id: &str) -> Result<Option<UserRecord>>;

    async fn get_by_email(&self, email: &str) -> Result<Option<UserRecord>>;
}

#[async_trait]
impl<T: ReadRepository + ?Sized> ReadRepository for Arc<T> {
    async fn get(&self, id: &ShortId) -> Result<Option<UrlRecord>> {
        (**self).get(id).await
    }

    async fn exists(&self, id: &ShortId) -> Result<bool> {
        (**self).exists(id).await
    }
}

#[async_trait]
impl<T: Repository + ?Sized> Repository for Arc<T> {
    async fn insert(&self, record: UrlRecord) -> Result<()> {
        (**self).insert(record).await
    }
}

#[async_trait]
impl<T: UserRepository + ?Sized> UserRepository for Arc<T> {
    async fn create(&self, user: &UserRecord) -> Result<()> {
        (**self).create(user).await
    }

    async fn update_password(&self, id: &str, password_hash: &str) -> Result<bool> {
        (**self).update_password(id, password_hash).await
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<UserRecord>> {
        (**self).get_by_id(id).await
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        (**self).get_by_email(email).await
    }
}
