use axum::{
    extract::{FromRequest, FromRequestParts, Path, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;
use service_core::error::AppError;
use thiserror::Error;
use validator::{Validate, ValidateEmail};

use crate::utils::Password;

/// JSON body extractor that runs `validator` rules before the handler sees it.
///
/// Malformed bodies and rule violations both surface as 400.
pub struct ValidatedJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + 'static,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Invalid JSON body: {}", e)))?;

        value.validate()?;

        Ok(ValidatedJson(value))
    }
}

/// Path parameter extractor whose rejection is the usual JSON 400 body.
pub struct ValidatedPath<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequestParts<S> for ValidatedPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Invalid path parameter: {}", e)))?;

        Ok(ValidatedPath(value))
    }
}

/// Field-level input problems detected before anything touches storage.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FieldError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("'{0}' is not a valid email address")]
    InvalidEmail(String),
}

/// Usernames are case-sensitive; only surrounding whitespace is dropped.
pub fn normalize_username(raw: &str) -> Result<String, FieldError> {
    non_blank(raw, "username")
}

pub fn normalize_email(raw: &str) -> Result<String, FieldError> {
    let email = non_blank(raw, "email")?;
    if !email.validate_email() {
        return Err(FieldError::InvalidEmail(email));
    }
    Ok(email)
}

pub fn normalize_group_name(raw: &str) -> Result<String, FieldError> {
    non_blank(raw, "name")
}

/// Passwords are taken verbatim, but must not be empty or whitespace.
pub fn require_password(password: &Password) -> Result<(), FieldError> {
    if password.is_blank() {
        return Err(FieldError::Missing("password"));
    }
    Ok(())
}

fn non_blank(raw: &str, field: &'static str) -> Result<String, FieldError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(FieldError::Missing(field));
    }
    Ok(trimmed.to_string())
}
