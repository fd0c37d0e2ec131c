//! Request extractors: bearer tokens per scope and client metadata.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use shortbin_auth::{Scope, Subject};
use shortbin_core::RequestMeta;

use crate::error::AppError;
use crate::state::AppState;

/// Holder of a valid `login-access` token.
#[derive(Debug, Clone)]
pub struct AccessBearer(pub Subject);

/// Holder of a valid `refresh` token.
#[derive(Debug, Clone)]
pub struct RefreshBearer(pub Subject);

/// `login-access` bearer when an `Authorization` header is sent.
/// A header that is present but invalid is still rejected.
#[derive(Debug, Clone)]
pub struct OptionalAccessBearer(pub Option<Subject>);

/// Caller details recorded with access events.
#[derive(Debug, Clone)]
pub struct ClientMeta(pub RequestMeta);

fn bearer_token(headers: &HeaderMap) -> Option<Result<&str, AppError>> {
    let value = headers.get(AUTHORIZATION)?;
    let token = value
        .to_str()
        .ok()
        .and_then(|value| value.split_once(' '))
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
        .map(|(_, token)| token.trim())
        .filter(|token| !token.is_empty());

    Some(token.ok_or_else(|| AppError::Unauthorized("malformed authorization header".to_string())))
}

fn authenticate(parts: &Parts, state: &AppState, scope: Scope) -> Result<Subject, AppError> {
    let token = bearer_token(&parts.headers)
        .unwrap_or_else(|| Err(AppError::Unauthorized("missing bearer token".to_string())))?;
    Ok(state.accounts().authenticate(token, scope)?)
}

impl FromRequestParts<AppState> for AccessBearer {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        authenticate(parts, state, Scope::LoginAccess).map(AccessBearer)
    }
}

impl FromRequestParts<AppState> for RefreshBearer {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        authenticate(parts, state, Scope::Refresh).map(RefreshBearer)
    }
}

impl FromRequestParts<AppState> for OptionalAccessBearer {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        if !parts.headers.contains_key(AUTHORIZATION) {
            return Ok(OptionalAccessBearer(None));
        }
        authenticate(parts, state, Scope::LoginAccess).map(|subject| OptionalAccessBearer(Some(subject)))
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

impl<S: Send + Sync> FromRequestParts<S> for ClientMeta {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Infallible> {
        // Absent when the router is served without connect info.
        let ip_address = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_default();

        Ok(ClientMeta(RequestMeta {
            ip_address,
            user_agent: header_value(&parts.headers, "user-agent"),
            referer: header_value(&parts.headers, "referer"),
            forwarded_for: header_value(&parts.headers, "x-forwarded-for"),
            request_host: header_value(&parts.headers, "host"),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(authorization: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(authorization).unwrap());
        headers
    }

    #[test]
    fn bearer_token_parsing() {
        assert!(bearer_token(&HeaderMap::new()).is_none());
        assert_eq!(bearer_token(&headers("Bearer abc")).unwrap().unwrap(), "abc");
        assert_eq!(bearer_token(&headers("bearer  abc ")).unwrap().unwrap(), "abc");
        assert!(bearer_token(&headers("Basic abc")).unwrap().is_err());
        assert!(bearer_token(&headers("Bearer ")).unwrap().is_err());
        assert!(bearer_token(&headers("abc")).unwrap().is_err());
    }
}
