use axum::extract::{Path, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::debug;

use crate::error::{AppError, Result};
use crate::extract::ClientMeta;
use crate::state::AppState;

pub async fn redirect_handler(
    State(state): State<AppState>,
    Path(short_id): Path<String>,
    ClientMeta(meta): ClientMeta,
) -> Result<Response> {
    let resolution = state.redirector().resolve(&short_id, meta).await?;
    debug!(short_id = %short_id, cache_hit = resolution.cache_hit, "Redirecting");

    let location = HeaderValue::try_from(resolution.long_url)
        .map_err(|e| AppError::Internal(format!("stored url is not a valid header: {e}")))?;

    Ok((StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, location)]).into_response())
}
