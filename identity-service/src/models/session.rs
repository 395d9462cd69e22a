//! Per-caller authentication state.

use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Identity captured at login. `is_admin` is a snapshot and is not refreshed
/// until the account logs in again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionPrincipal {
    pub account_id: Uuid,
    pub username: String,
    pub is_admin: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Session {
    #[default]
    Anonymous,
    Authenticated(SessionPrincipal),
}

impl Session {
    pub fn principal(&self) -> Option<&SessionPrincipal> {
        match self {
            Session::Anonymous => None,
            Session::Authenticated(principal) => Some(principal),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Session::Authenticated(_))
    }
}

/// Opaque bearer token naming a server-side session.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: String) -> Self {
        Self(token)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(<redacted>)")
    }
}

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: SessionToken,
    pub principal: SessionPrincipal,
}
