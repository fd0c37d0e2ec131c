use shortbin_core::StorageError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ShortenerError>;

#[derive(Debug, Clone, Error)]
pub enum ShortenerError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("expiry must be in the future")]
    InvalidExpiry,
    #[error("link lifetime out of range: {0}")]
    InvalidLifetime(String),
    #[error("no free short id after {0} attempts")]
    Exhausted(usize),
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<StorageError> for ShortenerError {
    fn from(error: StorageError) -> Self {
        ShortenerError::Storage(error.to_string())
    }
}
