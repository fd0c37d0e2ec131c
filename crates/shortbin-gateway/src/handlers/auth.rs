use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use shortbin_auth::Account;

use crate::error::Result;
use crate::extract::{AccessBearer, RefreshBearer};
use crate::model::{
    ChangePasswordRequest, CredentialsRequest, ForgotPasswordRequest, ForgotPasswordResponse,
    LoginResponse, MessageResponse, RefreshResponse, RegisterResponse, ResetPasswordRequest,
};
use crate::state::AppState;

type Body<T> = std::result::Result<Json<T>, JsonRejection>;

pub async fn register_handler(
    State(state): State<AppState>,
    payload: Body<CredentialsRequest>,
) -> Result<Json<RegisterResponse>> {
    let Json(request) = payload?;
    let account = state
        .accounts()
        .register(&request.email, &request.password)
        .await?;
    Ok(Json(account.into()))
}

pub async fn login_handler(
    State(state): State<AppState>,
    payload: Body<CredentialsRequest>,
) -> Result<Json<LoginResponse>> {
    let Json(request) = payload?;
    let (account, tokens) = state
        .accounts()
        .login(&request.email, &request.password)
        .await?;

    Ok(Json(LoginResponse {
        user_details: account,
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
    }))
}

pub async fn refresh_handler(
    State(state): State<AppState>,
    RefreshBearer(subject): RefreshBearer,
) -> Result<Json<RefreshResponse>> {
    let access_token = state.accounts().refresh(&subject).await?;
    Ok(Json(RefreshResponse { access_token }))
}

pub async fn me_handler(
    State(state): State<AppState>,
    AccessBearer(subject): AccessBearer,
) -> Result<Json<Account>> {
    Ok(Json(state.accounts().me(&subject.id).await?))
}

pub async fn change_password_handler(
    State(state): State<AppState>,
    AccessBearer(subject): AccessBearer,
    payload: Body<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>> {
    let Json(request) = payload?;
    state
        .accounts()
        .change_password(&subject.id, &request.password, &request.new_password)
        .await?;
    Ok(Json(MessageResponse {
        message: "password changed successfully",
    }))
}

/// Returns the reset token in the body; there is no mail delivery.
pub async fn forgot_password_handler(
    State(state): State<AppState>,
    payload: Body<ForgotPasswordRequest>,
) -> Result<Json<ForgotPasswordResponse>> {
    let Json(request) = payload?;
    let access_token = state.accounts().forgot_password(&request.email).await?;
    Ok(Json(ForgotPasswordResponse {
        message: "forgot password email sent",
        access_token,
    }))
}

pub async fn reset_password_handler(
    State(state): State<AppState>,
    payload: Body<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>> {
    let Json(request) = payload?;
    state
        .accounts()
        .reset_password(&request.reset_token, &request.password)
        .await?;
    Ok(Json(MessageResponse {
        message: "password reset successful",
    }))
}
