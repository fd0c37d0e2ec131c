//! Redirect resolution: short id in, destination URL out.
//!
//! [`RedirectResolver`] reads through a [`ReadCache`](shortbin_core::ReadCache)
//! with a sliding TTL, falls back to the URL store on a miss, and hands cache
//! population and access-event publication to detached background tasks.
//!
//! ```rust,no_run
//! use shortbin_core::RequestMeta;
//! use shortbin_redirector::{Redirector, RedirectResolver, ResolverSettings};
//! # async fn example<R, C, E>(repo: R, cache: C, events: E) -> shortbin_redirector::Result<()>
//! # where R: shortbin_core::ReadRepository, C: shortbin_core::ReadCache, E: shortbin_core::EventSink {
//! let resolver = RedirectResolver::new(repo, cache, events, ResolverSettings::default());
//! let resolution = resolver.resolve("abc1234", RequestMeta::default()).await?;
//! println!("Redirect to: {}", resolution.long_url);
//! # Ok(())
//! # }
//! ```

mod error;
mod inflight;
pub mod redirector;
pub mod resolver;
pub mod value;

pub use error::{RedirectError, Result};
pub use redirector::{Redirector, Resolution};
pub use resolver::{RedirectResolver, ResolverSettings, DEFAULT_CACHE_TTL};
pub use value::CachedTarget;
