use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use shortbin_shortener::ShortenParams;

use crate::error::Result;
use crate::extract::OptionalAccessBearer;
use crate::model::{CreateUrlRequest, CreateUrlResponse};
use crate::state::AppState;

/// Anonymous callers get an unattributed link.
pub async fn create_url_handler(
    State(state): State<AppState>,
    OptionalAccessBearer(subject): OptionalAccessBearer,
    payload: std::result::Result<Json<CreateUrlRequest>, JsonRejection>,
) -> Result<Json<CreateUrlResponse>> {
    let Json(request) = payload?;

    let record = state
        .shortener()
        .shorten(ShortenParams {
            long_url: request.long_url,
            owner: subject.map(|subject| subject.id),
            expires_at: request.expires_at,
        })
        .await?;

    Ok(Json(record.into()))
}
