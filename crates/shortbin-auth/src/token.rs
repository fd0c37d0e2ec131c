use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use jiff::Timestamp;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::error::TokenError;

/// What a token may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    #[serde(rename = "login-access")]
    LoginAccess,
    #[serde(rename = "refresh")]
    Refresh,
    #[serde(rename = "password-reset")]
    PasswordReset,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::LoginAccess => "login-access",
            Scope::Refresh => "refresh",
            Scope::PasswordReset => "password-reset",
        }
    }
}

impl Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifetime of a token, per scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TypedBuilder)]
pub struct ScopeExpiry {
    #[builder(default = Duration::from_secs(5 * 60 * 60))]
    pub login_access: Duration,
    #[builder(default = Duration::from_secs(7 * 24 * 60 * 60))]
    pub refresh: Duration,
    #[builder(default = Duration::from_secs(15 * 60))]
    pub password_reset: Duration,
}

impl ScopeExpiry {
    pub fn for_scope(&self, scope: Scope) -> Duration {
        match scope {
            Scope::LoginAccess => self.login_access,
            Scope::Refresh => self.refresh,
            Scope::PasswordReset => self.password_reset,
        }
    }
}

impl Default for ScopeExpiry {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Source of "now" for issuing and checking tokens.
pub trait TokenClock: Send + Sync {
    fn now_epoch_secs(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl TokenClock for SystemClock {
    fn now_epoch_secs(&self) -> i64 {
        Timestamp::now().as_second()
    }
}

/// Always reports the same instant. For tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl TokenClock for FixedClock {
    fn now_epoch_secs(&self) -> i64 {
        self.0
    }
}

#[derive(Clone, TypedBuilder)]
pub struct TokenSettings {
    /// HMAC key for HS256.
    pub secret: SecretString,
    #[builder(default)]
    pub expiry: ScopeExpiry,
    #[builder(default = Arc::new(SystemClock))]
    pub clock: Arc<dyn TokenClock>,
}

impl std::fmt::Debug for TokenSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSettings")
            .field("secret", &"[REDACTED]")
            .field("expiry", &self.expiry)
            .field("clock", &"<TokenClock>")
            .finish()
    }
}

/// Signed token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Account id.
    pub sub: String,
    pub email: String,
    pub scope: Scope,
    pub iat: i64,
    pub exp: i64,
}

/// The identity a token was issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub id: String,
    pub email: String,
}

impl From<Claims> for Subject {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            email: claims.email,
        }
    }
}

/// Issues and validates HS256 tokens. Stateless: nothing is stored, and a
/// token stays valid until it expires.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiry: ScopeExpiry,
    clock: Arc<dyn TokenClock>,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("expiry", &self.expiry)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(settings: TokenSettings) -> Self {
        let secret = settings.secret.expose_secret().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            expiry: settings.expiry,
            clock: settings.clock,
        }
    }

    /// Signs a token for `subject`. The lifetime comes from the scope table.
    pub fn issue(&self, subject: &Subject, scope: Scope) -> Result<String, TokenError> {
        let now = self.clock.now_epoch_secs();
        let lifetime = i64::try_from(self.expiry.for_scope(scope).as_secs())
            .map_err(|e| TokenError::Signing(e.to_string()))?;

        let claims = Claims {
            sub: subject.id.clone(),
            email: subject.email.clone(),
            scope,
            iat: now,
            exp: now.saturating_add(lifetime),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Verifies signature and expiry, whatever the scope.
    pub fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        // Signature only; expiry is checked below against our own clock.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.required_spec_claims = std::collections::HashSet::from(["exp".to_string()]);

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => {
                    TokenError::Invalid("signature is invalid".to_string())
                }
                _ => TokenError::Invalid(e.to_string()),
            })?
            .claims;

        if claims.exp <= self.clock.now_epoch_secs() {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }

    /// Verifies a token and requires it to carry `expected` scope.
    pub fn validate(&self, token: &str, expected: Scope) -> Result<Claims, TokenError> {
        let claims = self.decode(token)?;
        if claims.scope != expected {
            return Err(TokenError::WrongScope);
        }
        Ok(claims)
    }
}
