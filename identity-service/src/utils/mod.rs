pub mod password;
pub mod validation;

pub use password::{CredentialHasher, Password, PasswordHashString};
pub use validation::{FieldError, ValidatedJson, ValidatedPath};
