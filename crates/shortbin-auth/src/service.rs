use std::sync::Arc;

use jiff::Timestamp;
use serde::Serialize;
use shortbin_core::{UserRecord, UserRepository};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{AuthError, Result};
use crate::input::{check_new_password, normalize_email};
use crate::password::PasswordHasher;
use crate::token::{Scope, Subject, TokenService};

/// Public view of an account. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    pub id: String,
    pub email: String,
    pub created_at: Timestamp,
}

impl From<UserRecord> for Account {
    fn from(user: UserRecord) -> Self {
        Self {
            id: user.id,
            email: user.email,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Account lifecycle over a [`UserRepository`].
///
/// Password hashing is CPU-bound and runs on the blocking pool.
pub struct AuthService<U> {
    users: Arc<U>,
    tokens: TokenService,
    hasher: PasswordHasher,
    /// Verified against on logins for unknown emails, so both failures cost
    /// one Argon2 verification.
    decoy_hash: OnceCell<String>,
}

impl<U: UserRepository> AuthService<U> {
    pub fn new(users: U, tokens: TokenService, hasher: PasswordHasher) -> Self {
        Self {
            users: Arc::new(users),
            tokens,
            hasher,
            decoy_hash: OnceCell::new(),
        }
    }

    pub async fn register(&self, email: &str, password: &str) -> Result<Account> {
        let email = normalize_email(email)?;
        check_new_password(password)?;

        let user = UserRecord {
            id: Uuid::new_v4().to_string(),
            email,
            password_hash: self.hash(password).await?,
            created_at: Timestamp::now(),
        };

        self.users.create(&user).await?;
        info!(user_id = %user.id, "Registered account");
        Ok(user.into())
    }

    /// Checks credentials and issues an access and a refresh token.
    pub async fn login(&self, email: &str, password: &str) -> Result<(Account, TokenPair)> {
        let email = normalize_email(email).map_err(|_| AuthError::WrongCredentials)?;
        let Some(user) = self.users.get_by_email(&email).await? else {
            debug!("Login for unknown email");
            let decoy = self
                .decoy_hash
                .get_or_try_init(|| self.hash(DECOY_PASSWORD))
                .await?;
            self.verify(password, decoy).await?;
            return Err(AuthError::WrongCredentials);
        };

        if !self.verify(password, &user.password_hash).await? {
            debug!(user_id = %user.id, "Login with wrong password");
            return Err(AuthError::WrongCredentials);
        }

        let subject = subject_of(&user);
        let pair = TokenPair {
            access_token: self.tokens.issue(&subject, Scope::LoginAccess)?,
            refresh_token: self.tokens.issue(&subject, Scope::Refresh)?,
        };
        Ok((user.into(), pair))
    }

    /// Issues a new access token for the holder of a valid refresh token.
    /// The refresh token itself is not rotated.
    pub async fn refresh(&self, subject: &Subject) -> Result<String> {
        let user = self
            .users
            .get_by_id(&subject.id)
            .await?
            .ok_or(AuthError::Unauthorized)?;
        Ok(self.tokens.issue(&subject_of(&user), Scope::LoginAccess)?)
    }

    pub async fn me(&self, id: &str) -> Result<Account> {
        self.users
            .get_by_id(id)
            .await?
            .map(Account::from)
            .ok_or(AuthError::NotFound)
    }

    pub async fn change_password(&self, id: &str, current: &str, new: &str) -> Result<()> {
        let user = self
            .users
            .get_by_id(id)
            .await?
            .ok_or(AuthError::NotFound)?;

        if !self.verify(current, &user.password_hash).await? {
            return Err(AuthError::WrongCredentials);
        }
        if current == new {
            return Err(AuthError::SamePassword);
        }
        check_new_password(new)?;

        let hash = self.hash(new).await?;
        if !self.users.update_password(id, &hash).await? {
            return Err(AuthError::NotFound);
        }
        info!(user_id = %id, "Password changed");
        Ok(())
    }

    /// Returns a short-lived password-reset token for the account.
    ///
    /// Delivery is the caller's business; nothing is sent from here.
    pub async fn forgot_password(&self, email: &str) -> Result<String> {
        let email = normalize_email(email)?;
        let user = self
            .users
            .get_by_email(&email)
            .await?
            .ok_or(AuthError::NotFound)?;

        let token = self.tokens.issue(&subject_of(&user), Scope::PasswordReset)?;
        info!(user_id = %user.id, "Issued password reset token");
        Ok(token)
    }

    pub async fn reset_password(&self, reset_token: &str, new: &str) -> Result<()> {
        let claims = self.tokens.validate(reset_token, Scope::PasswordReset)?;
        check_new_password(new)?;

        let hash = self.hash(new).await?;
        if !self.users.update_password(&claims.sub, &hash).await? {
            warn!(user_id = %claims.sub, "Reset token for a missing account");
            return Err(AuthError::NotFound);
        }
        info!(user_id = %claims.sub, "Password reset");
        Ok(())
    }

    /// Validates a bearer token for `scope` and returns who it was issued to.
    pub fn authenticate(&self, token: &str, scope: Scope) -> Result<Subject> {
        Ok(self.tokens.validate(token, scope)?.into())
    }

    async fn hash(&self, password: &str) -> Result<String> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?
            .map_err(AuthError::from)
    }

    async fn verify(&self, password: &str, hash: &str) -> Result<bool> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        let hash = hash.to_string();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?
            .map_err(AuthError::from)
    }
}

const DECOY_PASSWORD: &str = "shortbin-decoy-password";

fn subject_of(user: &UserRecord) -> Subject {
    Subject {
        id: user.id.clone(),
        email: user.email.clone(),
    }
}
