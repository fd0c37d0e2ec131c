use axum::extract::rejection::JsonRejection;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use shortbin_auth::AuthError;
use shortbin_redirector::RedirectError;
use shortbin_shortener::ShortenerError;
use tracing::{debug, error};

pub type Result<T> = std::result::Result<T, AppError>;

/// Every failure the HTTP surface can report.
///
/// The rendered `message` is fixed per variant; the carried detail is only
/// exposed as `debug` outside production.
#[derive(Debug)]
pub enum AppError {
    InvalidParameters(String),
    WrongCredentials,
    Unauthorized(String),
    IdNotFound(String),
    UserNotFound,
    UserExists,
    SamePassword,
    Internal(String),
}

/// JSON error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<String>,
}

/// Detail of a failed response, kept out of the body until
/// [`expose_error_detail`] decides to render it.
#[derive(Debug, Clone)]
struct ErrorDetail {
    message: &'static str,
    detail: String,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidParameters(_) | AppError::WrongCredentials | AppError::SamePassword => {
                StatusCode::BAD_REQUEST
            }
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::IdNotFound(_) | AppError::UserNotFound => StatusCode::NOT_FOUND,
            AppError::UserExists => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            AppError::InvalidParameters(_) => "invalid parameters",
            AppError::WrongCredentials => "wrong credentials",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::IdNotFound(_) => "id not found",
            AppError::UserNotFound => "user not found",
            AppError::UserExists => "user already exists",
            AppError::SamePassword => "new password must differ from the current one",
            AppError::Internal(_) => "something went wrong",
        }
    }

    fn detail(&self) -> Option<&str> {
        match self {
            AppError::InvalidParameters(detail)
            | AppError::Unauthorized(detail)
            | AppError::IdNotFound(detail)
            | AppError::Internal(detail) => Some(detail),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = ?self, "Request failed");
        } else {
            debug!(status = status.as_u16(), error = ?self, "Request rejected");
        }

        let message = self.message();
        let body = ErrorBody {
            message: message.to_string(),
            debug: None,
        };
        let mut response = (status, Json(body)).into_response();
        if let Some(detail) = self.detail() {
            response.extensions_mut().insert(ErrorDetail {
                message,
                detail: detail.to_string(),
            });
        }
        response
    }
}

/// Re-renders error responses with their `debug` detail.
/// Only layered outside production.
pub async fn expose_error_detail(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let Some(ErrorDetail { message, detail }) = response.extensions_mut().remove::<ErrorDetail>()
    else {
        return response;
    };

    let body = ErrorBody {
        message: message.to_string(),
        debug: Some(detail),
    };
    (response.status(), Json(body)).into_response()
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidParameters(rejection.body_text())
    }
}

impl From<RedirectError> for AppError {
    fn from(error: RedirectError) -> Self {
        match error {
            RedirectError::InvalidIdentifier(detail) => AppError::IdNotFound(detail),
            RedirectError::NotFound => AppError::IdNotFound(error.to_string()),
            RedirectError::Internal(detail) => AppError::Internal(detail),
        }
    }
}

impl From<ShortenerError> for AppError {
    fn from(error: ShortenerError) -> Self {
        match error {
            ShortenerError::InvalidUrl(detail) => AppError::InvalidParameters(detail),
            ShortenerError::InvalidExpiry => AppError::InvalidParameters(error.to_string()),
            ShortenerError::InvalidLifetime(_)
            | ShortenerError::Exhausted(_)
            | ShortenerError::Storage(_) => {
                AppError::Internal(error.to_string())
            }
        }
    }
}

impl From<AuthError> for AppError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::InvalidParameters(detail) => AppError::InvalidParameters(detail),
            AuthError::NotFound => AppError::UserNotFound,
            AuthError::WrongCredentials => AppError::WrongCredentials,
            AuthError::Unauthorized => AppError::Unauthorized(error.to_string()),
            AuthError::InvalidToken(source) => AppError::Unauthorized(source.to_string()),
            AuthError::Conflict => AppError::UserExists,
            AuthError::SamePassword => AppError::SamePassword,
            AuthError::Internal(detail) => AppError::Internal(detail),
        }
    }
}
