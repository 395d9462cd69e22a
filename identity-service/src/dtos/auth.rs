use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::SessionPrincipal;

// No Debug: the body carries a plaintext password.
#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub account: SessionPrincipal,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub principal: SessionPrincipal,
}
