//! HTTP handlers for identity-service.
//!
//! Each privileged handler names its guard in its signature through the
//! `Authenticated` / `AdminSession` extractors.

pub mod accounts;
pub mod auth;
pub mod groups;
pub mod health;
pub mod stats;
