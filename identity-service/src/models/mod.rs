//! Domain records for the identity store.

pub mod account;
pub mod group;
pub mod session;

pub use account::{Account, AccountChanges, AccountResponse, AccountStats, NewAccount};
pub use group::{Group, GroupChanges, GroupResponse, GroupSummary, NewGroup};
pub use session::{IssuedSession, Session, SessionPrincipal, SessionToken};
