mod auth;
mod url;

pub use auth::{
    ChangePasswordRequest, CredentialsRequest, ForgotPasswordRequest, ForgotPasswordResponse,
    LoginResponse, MessageResponse, RefreshResponse, RegisterResponse, ResetPasswordRequest,
};
pub use url::{CreateUrlRequest, CreateUrlResponse, HealthResponse};
