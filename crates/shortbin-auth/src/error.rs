use shortbin_core::StorageError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AuthError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// Bad signature, malformed token or missing claims.
    #[error("token is invalid: {0}")]
    Invalid(String),
    #[error("token has expired")]
    Expired,
    #[error("token scope does not match")]
    WrongScope,
    #[error("failed to sign token: {0}")]
    Signing(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PasswordError {
    #[error("failed to hash password: {0}")]
    Hash(String),
    #[error("stored password hash is malformed: {0}")]
    MalformedHash(String),
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
    #[error("account not found")]
    NotFound,
    /// Unknown email or wrong password; callers cannot tell which.
    #[error("wrong credentials")]
    WrongCredentials,
    #[error("unauthorized")]
    Unauthorized,
    #[error("invalid token: {0}")]
    InvalidToken(#[from] TokenError),
    #[error("account already exists")]
    Conflict,
    #[error("new password must differ from the current one")]
    SamePassword,
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StorageError> for AuthError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::Conflict(_) => AuthError::Conflict,
            other => AuthError::Internal(other.to_string()),
        }
    }
}

impl From<PasswordError> for AuthError {
    fn from(error: PasswordError) -> Self {
        AuthError::Internal(error.to_string())
    }
}
