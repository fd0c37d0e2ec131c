//! Persistent storage for URL mappings and accounts.

pub mod memory;
pub mod mysql;

pub use memory::{InMemoryRepository, InMemoryUserRepository};
pub use mysql::{MySqlRepository, MySqlSettings};
pub use shortbin_core::repository::{ReadRepository, Repository, Result, UserRepository};
pub use shortbin_core::StorageError;
