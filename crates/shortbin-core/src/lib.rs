//! Core types and traits for the shortbin URL shortener.
//!
//! This crate holds the data model shared by the redirect pipeline, the
//! link creation path and the account lifecycle, together with the narrow
//! contracts (repositories, read cache, event sink) that backend adapters
//! implement.

pub mod cache;
pub mod error;
pub mod events;
pub mod repository;
pub mod short_id;

pub use cache::ReadCache;
pub use error::{CacheError, CoreError, EventError, StorageError};
pub use events::{AccessEvent, EventSink, RequestMeta, Topic, ANONYMOUS_OWNER};
pub use repository::{ReadRepository, Repository, UrlRecord, UserRecord, UserRepository};
pub use short_id::{ShortId, ShortIdPolicy};
