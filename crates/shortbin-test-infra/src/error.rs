use thiserror::Error;

pub type Result<T> = std::result::Result<T, TestInfraError>;

#[derive(Debug, Error)]
pub enum TestInfraError {
    #[error("container: {0}")]
    Container(#[from] testcontainers::TestcontainersError),

    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("service never became ready")]
    NotReady,
}
