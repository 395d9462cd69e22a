//! Account model - password-protected identities.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

use crate::models::group::{Group, GroupSummary};
use crate::utils::Password;

/// Account entity as stored.
///
/// The password hash is only readable inside the crate; callers outside get
/// an [`AccountResponse`], which never carries it.
#[derive(Clone, FromRow)]
pub struct Account {
    pub account_id: Uuid,
    pub username: String,
    pub email: String,
    pub(crate) password_hash: String,
    pub is_admin: bool,
    pub is_active: bool,
    pub created_utc: DateTime<Utc>,
}

impl Account {
    pub(crate) fn new(
        username: String,
        email: String,
        password_hash: String,
        is_admin: bool,
        is_active: bool,
    ) -> Self {
        Self {
            account_id: Uuid::new_v4(),
            username,
            email,
            password_hash,
            is_admin,
            is_active,
            created_utc: Utc::now(),
        }
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("account_id", &self.account_id)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password_hash", &"<redacted>")
            .field("is_admin", &self.is_admin)
            .field("is_active", &self.is_active)
            .field("created_utc", &self.created_utc)
            .finish()
    }
}

/// Input for account creation. The plaintext is hashed before anything is stored.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password: Password,
    pub is_admin: bool,
    pub is_active: bool,
    pub group_ids: Vec<Uuid>,
}

/// Partial update; `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct AccountChanges {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<Password>,
    pub is_admin: Option<bool>,
    pub is_active: Option<bool>,
    pub group_ids: Option<Vec<Uuid>>,
}


/// Dashboard counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AccountStats {
    pub total_accounts: i64,
    pub active_accounts: i64,
    pub admin_accounts: i64,
    pub total_groups: i64,
}

/// Account response for API (without sensitive fields).
#[derive(Debug, Clone, Serialize)]
pub struct AccountResponse {
    pub account_id: Uuid,
    pub username: String,
    pub email: String,
    pub is_admin: bool,
    pub is_active: bool,
    pub created_utc: DateTime<Utc>,
    pub groups: Vec<GroupSummary>,
}

impl AccountResponse {
    pub fn with_groups(account: Account, groups: Vec<Group>) -> Self {
        Self {
            groups: groups.into_iter().map(GroupSummary::from).collect(),
            ..Self::from(account)
        }
    }
}

impl From<Account> for AccountResponse {
    fn from(a: Account) -> Self {
        Self {
            account_id: a.account_id,
            username: a.username,
            email: a.email,
            is_admin: a.is_admin,
            is_active: a.is_active,
            created_utc: a.created_utc,
            groups: Vec::new(),
        }
    }
}
