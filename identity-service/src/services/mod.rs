//! Services layer for the identity service.
//!
//! Each component owns one slice of the data model and runs every public
//! operation in a single storage unit of work.

pub mod authenticator;
pub mod credentials;
pub mod error;
pub mod groups;
pub mod membership;
pub mod metrics;
pub mod sessions;

#[cfg(test)]
pub(crate) mod test_support;

pub use authenticator::{SessionAuthenticator, SessionPolicy};
pub use credentials::CredentialStore;
pub use error::ServiceError;
pub use groups::GroupRegistry;
pub use membership::MembershipGraph;
pub use sessions::SessionRegistry;
