use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::error::expose_error_detail;
use crate::handlers::{
    change_password_handler, create_url_handler, forgot_password_handler, health_handler,
    login_handler, me_handler, redirect_handler, refresh_handler, register_handler,
    reset_password_handler,
};
use crate::state::AppState;

pub struct App {}

impl App {
    pub fn router(state: AppState) -> Router {
        let auth = Router::new()
            .route("/register", post(register_handler))
            .route("/login", post(login_handler))
            .route("/refresh", post(refresh_handler))
            .route("/me", get(me_handler))
            .route("/change-password", post(change_password_handler))
            .route("/forgot-password", post(forgot_password_handler))
            .route("/reset-password", post(reset_password_handler));

        let api = Router::new()
            .route("/health", get(health_handler))
            .nest(
                "/v1/urls",
                Router::new().route("/create", post(create_url_handler)),
            )
            .nest("/v1/auth", auth);

        let mut router = Router::new()
            .route("/{short_id}", get(redirect_handler))
            .nest("/api", api)
            .layer(TraceLayer::new_for_http());

        if !state.environment().is_production() {
            router = router.layer(middleware::from_fn(expose_error_detail));
        }

        router.with_state(state)
    }
}
