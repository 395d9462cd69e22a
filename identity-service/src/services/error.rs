use service_core::error::AppError;
use thiserror::Error;

use crate::store::{
    StoreError, ACCOUNTS_EMAIL_KEY, ACCOUNTS_USERNAME_KEY, GROUPS_NAME_KEY,
    MEMBERSHIPS_ACCOUNT_FKEY, MEMBERSHIPS_GROUP_FKEY,
};
use crate::utils::FieldError;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Username already taken")]
    UsernameTaken,

    #[error("Email already registered")]
    EmailTaken,

    #[error("Group name already taken")]
    GroupNameTaken,

    #[error("Duplicate record: {0}")]
    DuplicateRecord(String),

    #[error("Account not found")]
    AccountNotFound,

    #[error("Group not found")]
    GroupNotFound,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account is inactive")]
    AccountInactive,

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}


impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation(constraint) => match constraint.as_str() {
                ACCOUNTS_USERNAME_KEY => ServiceError::UsernameTaken,
                ACCOUNTS_EMAIL_KEY => ServiceError::EmailTaken,
                GROUPS_NAME_KEY => ServiceError::GroupNameTaken,
                _ => ServiceError::DuplicateRecord(constraint),
            },
            StoreError::ForeignKeyViolation(constraint) => match constraint.as_str() {
                MEMBERSHIPS_ACCOUNT_FKEY => ServiceError::AccountNotFound,
                MEMBERSHIPS_GROUP_FKEY => ServiceError::GroupNotFound,
                _ => ServiceError::Internal(anyhow::anyhow!(
                    "Foreign key violation on {}",
                    constraint
                )),
            },
            StoreError::Backend(e) => ServiceError::Internal(e),
        }
    }
}

impl From<FieldError> for ServiceError {
    fn from(err: FieldError) -> Self {
        ServiceError::Validation(err.to_string())
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(e) => AppError::BadRequest(anyhow::anyhow!(e)),
            ServiceError::UsernameTaken => {
                AppError::Conflict(anyhow::anyhow!("Username already taken"))
            }
            ServiceError::EmailTaken => {
                AppError::Conflict(anyhow::anyhow!("Email already registered"))
            }
            ServiceError::GroupNameTaken => {
                AppError::Conflict(anyhow::anyhow!("Group name already taken"))
            }
            ServiceError::DuplicateRecord(_) => {
                AppError::Conflict(anyhow::anyhow!("Duplicate record"))
            }
            ServiceError::AccountNotFound => {
                AppError::NotFound(anyhow::anyhow!("Account not found"))
            }
            ServiceError::GroupNotFound => AppError::NotFound(anyhow::anyhow!("Group not found")),
            ServiceError::InvalidCredentials => {
                AppError::Unauthorized(anyhow::anyhow!("Invalid username or password"))
            }
            ServiceError::AccountInactive => {
                AppError::Forbidden(anyhow::anyhow!("Account is inactive"))
            }
            ServiceError::Internal(e) => AppError::InternalError(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use service_core::axum::http::StatusCode;

    #[test]
    fn test_unique_violations_map_by_constraint() {
        let err: ServiceError = StoreError::UniqueViolation(ACCOUNTS_USERNAME_KEY.into()).into();
        assert!(matches!(err, ServiceError::UsernameTaken));

        let err: ServiceError = StoreError::UniqueViolation(ACCOUNTS_EMAIL_KEY.into()).into();
        assert!(matches!(err, ServiceError::EmailTaken));

        let err: ServiceError = StoreError::UniqueViolation(GROUPS_NAME_KEY.into()).into();
        assert!(matches!(err, ServiceError::GroupNameTaken));

        let err: ServiceError = StoreError::UniqueViolation("other_key".into()).into();
        assert!(matches!(err, ServiceError::DuplicateRecord(ref c) if c == "other_key"));
    }

    #[test]
    fn test_foreign_key_violations_are_not_found() {
        let err: ServiceError =
            StoreError::ForeignKeyViolation(MEMBERSHIPS_GROUP_FKEY.into()).into();
        assert!(matches!(err, ServiceError::GroupNotFound));

        let err: ServiceError =
            StoreError::ForeignKeyViolation(MEMBERSHIPS_ACCOUNT_FKEY.into()).into();
        assert!(matches!(err, ServiceError::AccountNotFound));
    }

    #[test]
    fn test_http_status_mapping() {
        let cases = [
            (ServiceError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (ServiceError::UsernameTaken, StatusCode::CONFLICT),
            (ServiceError::GroupNotFound, StatusCode::NOT_FOUND),
            (ServiceError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (ServiceError::AccountInactive, StatusCode::FORBIDDEN),
            (
                ServiceError::Internal(anyhow::anyhow!("pool timed out")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(AppError::from(err).status(), status);
        }
    }
}
