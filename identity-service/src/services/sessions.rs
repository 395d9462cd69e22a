//! Server-side session table.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rand::Rng;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{Session, SessionPrincipal, SessionToken};

const TOKEN_BYTES: usize = 32;

#[derive(Debug, Clone)]
struct SessionEntry {
    principal: SessionPrincipal,
    expires_utc: DateTime<Utc>,
}

impl SessionEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_utc
    }
}

/// Token-keyed sessions. Entries are independent; there is no cross-session lock.
#[derive(Clone)]
pub struct SessionRegistry {
    entries: Arc<DashMap<String, SessionEntry>>,
    ttl: Duration,
}

impl SessionRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
        }
    }

    pub fn issue(&self, principal: SessionPrincipal) -> SessionToken {
        let token = generate_token();
        self.entries.insert(
            token.clone(),
            SessionEntry {
                principal,
                expires_utc: Utc::now() + self.ttl,
            },
        );
        SessionToken::new(token)
    }

    /// Look up a token; unknown and expired tokens are `Anonymous`.
    pub fn resolve(&self, token: &str) -> Session {
        let now = Utc::now();
        match self.entries.get(token) {
            None => return Session::Anonymous,
            Some(entry) if !entry.is_expired(now) => {
                return Session::Authenticated(entry.principal.clone())
            }
            Some(_) => {}
        }

        self.entries
            .remove_if(token, |_, entry| entry.is_expired(now));
        Session::Anonymous
    }

    /// Returns whether a session was removed.
    pub fn revoke(&self, token: &str) -> bool {
        self.entries.remove(token).is_some()
    }

    /// Drop every session of `account_id`, optionally sparing one token.
    pub fn revoke_account(&self, account_id: Uuid, keep: Option<&str>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|token, entry| {
            entry.principal.account_id != account_id || keep == Some(token.as_str())
        });
        before.saturating_sub(self.entries.len())
    }

    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.entries.len())
    }

    pub fn active_count(&self) -> usize {
        self.entries.len()
    }
}

fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let mut bytes = [0u8; TOKEN_BYTES];
    rng.fill(&mut bytes[..]);
    URL_SAFE_NO_PAD.encode(bytes)
}
