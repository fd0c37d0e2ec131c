use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use shortbin_core::repository::{ReadRepository, Repository, Result, UserRepository};
use shortbin_core::{ShortId, StorageError, UrlRecord, UserRecord};

/// In-memory implementation of the URL repository using DashMap.
///
/// DashMap provides better concurrency than RwLock<HashMap> because it
/// uses sharded locks, allowing concurrent reads and writes to different
/// buckets without blocking.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    storage: DashMap<String, UrlRecord>,
}

impl InMemoryRepository {
    /// Creates a new in-memory repository.
    pub fn new() -> Self {
        Self {
            storage: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }
}

#[async_trait]
impl ReadRepository for InMemoryRepository {
    async fn get(&self, id: &ShortId) -> Result<Option<UrlRecord>> {
        Ok(self.storage.get(id.as_str()).map(|entry| entry.clone()))
    }

    async fn exists(&self, id: &ShortId) -> Result<bool> {
        Ok(self.storage.contains_key(id.as_str()))
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn insert(&self, record: UrlRecord) -> Result<()> {
        // The entry API holds the shard lock, so check-and-insert is atomic.
        match self.storage.entry(record.short_id.as_str().to_owned()) {
            Entry::Occupied(_) => Err(StorageError::Conflict(record.short_id.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(())
            }
        }
    }
}

/// In-memory account store.
///
/// Accounts are keyed by id; a second map enforces email uniqueness.
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserRepository {
    users: DashMap<String, UserRecord>,
    emails: DashMap<String, String>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: &UserRecord) -> Result<()> {
        match self.emails.entry(user.email.clone()) {
            Entry::Occupied(_) => Err(StorageError::Conflict(user.email.clone())),
            Entry::Vacant(slot) => {
                slot.insert(user.id.clone());
                self.users.insert(user.id.clone(), user.clone());
                Ok(())
            }
        }
    }

    async fn update_password(&self, id: &str, password_hash: &str) -> Result<bool> {
        match self.users.get_mut(id) {
            Some(mut user) => {
                user.password_hash = password_hash.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<UserRecord>> {
        Ok(self.users.get(id).map(|user| user.clone()))
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let Some(id) = self.emails.get(email).map(|id| id.clone()) else {
            return Ok(None);
        };
        self.get_by_id(&id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::{SignedDuration, Timestamp};
    use std::sync::Arc;

    fn record(id: &str, url: &str) -> UrlRecord {
        let now = Timestamp::now();
        UrlRecord {
            short_id: ShortId::new_unchecked(id),
            long_url: url.to_string(),
            owner_id: None,
            created_at: now,
            expires_at: now + SignedDuration::from_hours(24),
        }
    }

    fn user(id: &str, email: &str) -> UserRecord {
        UserRecord {
            id: id.to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            created_at: Timestamp::now(),
        }
    }

    #[tokio::test]
    async fn insert_and_get() {
        let repo = InMemoryRepository::new();
        let rec = record("abc123", "https://example.com");

        repo.insert(rec.clone()).await.unwrap();

        let got = repo.get(&rec.short_id).await.unwrap();
        assert_eq!(got, Some(rec));
    }

    #[tokio::test]
    async fn get_nonexistent() {
        let repo = InMemoryRepository::new();
        let got = repo.get(&ShortId::new_unchecked("nope00")).await.unwrap();
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn insert_duplicate_conflicts() {
        let repo = InMemoryRepository::new();
        repo.insert(record("abc123", "https://one.example"))
            .await
            .unwrap();

        let err = repo
            .insert(record("abc123", "https://two.example"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));

        // First write wins.
        let got = repo.get(&ShortId::new_unchecked("abc123")).await.unwrap();
        assert_eq!(got.unwrap().long_url, "https://one.example");
    }

    #[tokio::test]
    async fn exists_tracks_inserts() {
        let repo = InMemoryRepository::new();
        let id = ShortId::new_unchecked("abc123");
        assert!(!repo.exists(&id).await.unwrap());

        repo.insert(record("abc123", "https://example.com"))
            .await
            .unwrap();
        assert!(repo.exists(&id).await.unwrap());
    }

    #[tokio::test]
    async fn concurrent_inserts_same_id_only_one_wins() {
        let repo = Arc::new(InMemoryRepository::new());

        let mut handles = Vec::new();
        for i in 0..16 {
            let repo = Arc::clone(&repo);
            handles.push(tokio::spawn(async move {
                repo.insert(record("race01", &format!("https://{i}.example")))
                    .await
                    .is_ok()
            }));
        }

        let mut wins = 0;
        for handle in handles {
            if handle.await.unwrap() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn user_create_and_lookup() {
        let repo = InMemoryUserRepository::new();
        let u = user("u1", "alice@example.com");
        repo.create(&u).await.unwrap();

        assert_eq!(repo.get_by_id("u1").await.unwrap(), Some(u.clone()));
        assert_eq!(
            repo.get_by_email("alice@example.com").await.unwrap(),
            Some(u)
        );
        assert!(repo.get_by_email("bob@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn user_duplicate_email_conflicts() {
        let repo = InMemoryUserRepository::new();
        repo.create(&user("u1", "alice@example.com")).await.unwrap();

        let err = repo
            .create(&user("u2", "alice@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
        assert!(repo.get_by_id("u2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_password_replaces_hash() {
        let repo = InMemoryUserRepository::new();
        repo.create(&user("u1", "alice@example.com")).await.unwrap();

        assert!(repo.update_password("u1", "new-hash").await.unwrap());
        assert!(!repo.update_password("missing", "x").await.unwrap());

        let stored = repo.get_by_id("u1").await.unwrap().unwrap();
        assert_eq!(stored.password_hash, "new-hash");
    }
}
