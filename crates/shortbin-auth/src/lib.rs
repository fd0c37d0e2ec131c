//! Account authentication.
//!
//! - [`TokenService`] issues and validates scoped, expiring HS256 tokens.
//! - [`PasswordHasher`] hashes and verifies passwords with Argon2id.
//! - [`AuthService`] drives registration, login, refresh and password
//!   changes over a [`UserRepository`](shortbin_core::UserRepository).

pub mod error;
pub mod input;
pub mod password;
pub mod service;
pub mod token;

pub use error::{AuthError, PasswordError, Result, TokenError};
pub use password::PasswordHasher;
pub use service::{Account, AuthService, TokenPair};
pub use token::{
    Claims, FixedClock, Scope, ScopeExpiry, Subject, SystemClock, TokenClock, TokenService,
    TokenSettings,
};
