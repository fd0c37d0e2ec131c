mod auth;
mod health;
mod redirect;
mod url;

pub use auth::{
    change_password_handler, forgot_password_handler, login_handler, me_handler,
    refresh_handler, register_handler, reset_password_handler,
};
pub use health::health_handler;
pub use redirect::redirect_handler;
pub use url::create_url_handler;
