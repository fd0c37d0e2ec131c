//! Read cache backends for the redirect path.

pub mod moka;
pub mod redis;
pub mod timeout;

pub use self::moka::MokaReadCache;
pub use self::redis::RedisReadCache;
pub use shortbin_core::cache::{ReadCache, Result};
pub use shortbin_core::CacheError;
pub use timeout::TimeoutCache;
