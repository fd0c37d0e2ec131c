//! Link creation: validate, generate an id, persist.

pub mod error;
pub mod service;
pub mod shortener;

pub use error::{Result, ShortenerError};
pub use service::{ShortenerService, ShortenerSettings};
pub use shortener::{ShortenParams, Shortener};
