use axum::{extract::State, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use service_core::error::AppError;

use crate::{
    dtos::{
        auth::{LoginRequest, LoginResponse, MeResponse},
        MessageResponse,
    },
    middleware::{Authenticated, CurrentSession, SESSION_COOKIE},
    utils::{Password, ValidatedJson},
    AppState,
};

/// Login with username and password.
///
/// The token is returned in the body for API callers and set as an
/// `HttpOnly` cookie for browsers.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), AppError> {
    let issued = state
        .authenticator
        .login(&req.username, &Password::new(req.password))
        .await?;

    let cookie = Cookie::build((SESSION_COOKIE, issued.token.as_str().to_string()))
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.session.cookie_secure)
        .path("/")
        .build();

    Ok((
        jar.add(cookie),
        Json(LoginResponse {
            token: issued.token.into_string(),
            account: issued.principal,
        }),
    ))
}

/// End the caller's session. Succeeds for anonymous callers too.
pub async fn logout(
    State(state): State<AppState>,
    CurrentSession(context): CurrentSession,
    jar: CookieJar,
) -> (CookieJar, Json<MessageResponse>) {
    if let Some(token) = context.token.as_deref() {
        state.authenticator.logout(token);
    }

    (
        jar.remove(Cookie::build(SESSION_COOKIE).path("/")),
        Json(MessageResponse::new("Logged out successfully")),
    )
}

pub async fn me(Authenticated(principal): Authenticated) -> Json<MeResponse> {
    Json(MeResponse { principal })
}
