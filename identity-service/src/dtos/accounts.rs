use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::models::{AccountChanges, NewAccount};
use crate::utils::Password;

fn default_true() -> bool {
    true
}

#[derive(Deserialize, Validate)]
pub struct CreateAccountRequest {
    #[validate(length(min = 1, max = 80, message = "Username must be 1-80 characters"))]
    pub username: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,

    #[serde(default)]
    pub is_admin: bool,

    #[serde(default = "default_true")]
    pub is_active: bool,

    #[serde(default)]
    pub group_ids: Vec<Uuid>,
}

impl From<CreateAccountRequest> for NewAccount {
    fn from(req: CreateAccountRequest) -> Self {
        NewAccount {
            username: req.username,
            email: req.email,
            password: Password::new(req.password),
            is_admin: req.is_admin,
            is_active: req.is_active,
            group_ids: req.group_ids,
        }
    }
}

/// Partial update; absent fields stay as they are.
#[derive(Deserialize, Validate)]
pub struct UpdateAccountRequest {
    #[validate(length(min = 1, max = 80, message = "Username must be 1-80 characters"))]
    pub username: Option<String>,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    #[validate(length(min = 1, message = "Password must not be empty"))]
    pub password: Option<String>,

    pub is_admin: Option<bool>,
    pub is_active: Option<bool>,
    pub group_ids: Option<Vec<Uuid>>,
}

impl From<UpdateAccountRequest> for AccountChanges {
    fn from(req: UpdateAccountRequest) -> Self {
        AccountChanges {
            username: req.username,
            email: req.email,
            password: req.password.map(Password::new),
            is_admin: req.is_admin,
            is_active: req.is_active,
            group_ids: req.group_ids,
        }
    }
}

#[derive(Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 1, message = "New password is required"))]
    pub new_password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct GroupIdsRequest {
    pub group_ids: Vec<Uuid>,
}
