use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use service_core::error::AppError;

use crate::guard::{require_admin, require_authenticated};
use crate::models::{Session, SessionPrincipal};
use crate::AppState;

pub const SESSION_COOKIE: &str = "session";

/// Session resolved for the current request, plus the token it came from.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    pub session: Session,
    pub token: Option<String>,
}

/// Resolve the caller's token (bearer header first, then cookie) into a
/// [`SessionContext`] request extension. Never rejects; guards do that.
pub async fn session_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let token = session_token(req.headers());
    let session = token
        .as_deref()
        .map(|token| state.authenticator.resolve(token))
        .unwrap_or_default();

    req.extensions_mut().insert(SessionContext { session, token });

    next.run(req).await
}

fn session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());

    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    CookieJar::from_headers(headers)
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|token| !token.is_empty())
}

/// Extractor for the current session; anonymous when no token resolved.
pub struct CurrentSession(pub SessionContext);

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(CurrentSession(
            parts
                .extensions
                .get::<SessionContext>()
                .cloned()
                .unwrap_or_default(),
        ))
    }
}

/// Extractor that rejects anonymous callers with 401.
pub struct Authenticated(pub SessionPrincipal);

#[axum::async_trait]
impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CurrentSession(context) = CurrentSession::from_request_parts(parts, state).await?;
        let principal = require_authenticated(&context.session).map_err(|e| {
            tracing::warn!(path = %parts.uri.path(), "Rejected anonymous request");
            AppError::from(e)
        })?;
        Ok(Authenticated(principal.clone()))
    }
}

/// Extractor that additionally requires the admin snapshot (403 otherwise).
pub struct AdminSession(pub SessionPrincipal);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AdminSession
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CurrentSession(context) = CurrentSession::from_request_parts(parts, state).await?;
        let principal = require_admin(&context.session).map_err(|e| {
            tracing::warn!(path = %parts.uri.path(), reason = %e, "Rejected privileged request");
            AppError::from(e)
        })?;
        Ok(AdminSession(principal.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_preferred_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer from-header"),
        );
        headers.insert(header::COOKIE, HeaderValue::from_static("session=from-cookie"));
        assert_eq!(session_token(&headers).as_deref(), Some("from-header"));
    }

    #[test]
    fn test_cookie_token() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; session=abc123"),
        );
        assert_eq!(session_token(&headers).as_deref(), Some("abc123"));
    }

    #[test]
    fn test_missing_or_malformed_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(session_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(session_token(&headers), None);
    }
}
