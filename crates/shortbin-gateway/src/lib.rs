//! HTTP surface for shortbin: redirects, link creation and accounts.

pub mod app;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod model;
pub mod state;

pub use app::App;
pub use error::{AppError, Result};
pub use state::{Accounts, AppState, Environment};
