//! Authorization predicates over a [`Session`].
//!
//! These read nothing but the session value handed to them. The extractors in
//! [`crate::middleware::session`] call them before a handler body runs.

use service_core::error::AppError;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Session, SessionPrincipal};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GuardError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("Administrator privileges required")]
    Forbidden,

    #[error("You cannot delete your own account")]
    SelfDeletion,
}

impl From<GuardError> for AppError {
    fn from(err: GuardError) -> Self {
        match err {
            GuardError::Unauthenticated => AppError::Unauthorized(anyhow::anyhow!(err)),
            GuardError::Forbidden | GuardError::SelfDeletion => {
                AppError::Forbidden(anyhow::anyhow!(err))
            }
        }
    }
}

pub fn require_authenticated(session: &Session) -> Result<&SessionPrincipal, GuardError> {
    session.principal().ok_or(GuardError::Unauthenticated)
}

/// Uses the `is_admin` snapshot taken at login.
pub fn require_admin(session: &Session) -> Result<&SessionPrincipal, GuardError> {
    let principal = require_authenticated(session)?;
    if !principal.is_admin {
        return Err(GuardError::Forbidden);
    }
    Ok(principal)
}

/// An account may not delete its own record.
pub fn forbid_self(principal: &SessionPrincipal, target: Uuid) -> Result<(), GuardError> {
    if principal.account_id == target {
        return Err(GuardError::SelfDeletion);
    }
    Ok(())
}
