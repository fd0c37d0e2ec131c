use shortbin_core::{CoreError, StorageError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RedirectError>;

#[derive(Debug, Clone, Error)]
pub enum RedirectError {
    /// Rejected before any backend was consulted.
    #[error("invalid short id: {0}")]
    InvalidIdentifier(String),
    #[error("short id not found")]
    NotFound,
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<CoreError> for RedirectError {
    fn from(error: CoreError) -> Self {
        match error {
            CoreError::InvalidShortId(reason) => RedirectError::InvalidIdentifier(reason),
            other => RedirectError::Internal(other.to_string()),
        }
    }
}

impl From<StorageError> for RedirectError {
    fn from(error: StorageError) -> Self {
        RedirectError::Internal(error.to_string())
    }
}
