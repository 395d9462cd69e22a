use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::models::{IssuedSession, Session, SessionPrincipal};
use crate::services::metrics::record_login;
use crate::services::{CredentialStore, ServiceError, SessionRegistry};
use crate::utils::Password;

/// What happens to live sessions when account state changes underneath them.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionPolicy {
    pub revoke_on_password_change: bool,
}

/// Turns credentials into sessions and back.
#[derive(Clone)]
pub struct SessionAuthenticator {
    credentials: CredentialStore,
    sessions: SessionRegistry,
    policy: SessionPolicy,
}

impl SessionAuthenticator {
    pub fn new(
        credentials: CredentialStore,
        sessions: SessionRegistry,
        policy: SessionPolicy,
    ) -> Self {
        Self {
            credentials,
            sessions,
            policy,
        }
    }

    /// Unknown usernames and wrong passwords both yield `InvalidCredentials`.
    /// An inactive account yields `AccountInactive` before its password is checked.
    #[instrument(skip(self, password))]
    pub async fn login(
        &self,
        username: &str,
        password: &Password,
    ) -> Result<IssuedSession, ServiceError> {
        let account = match self.credentials.find_by_username(username.trim()).await? {
            Some(account) => account,
            None => {
                self.credentials.verify_dummy(password);
                record_login("invalid_credentials");
                warn!("Login failed: invalid credentials");
                return Err(ServiceError::InvalidCredentials);
            }
        };

        if !account.is_active {
            record_login("inactive");
            warn!(account_id = %account.account_id, "Login refused: account inactive");
            return Err(ServiceError::AccountInactive);
        }

        if !self
            .credentials
            .verify_password(account.account_id, password)
            .await?
        {
            record_login("invalid_credentials");
            warn!(account_id = %account.account_id, "Login failed: invalid credentials");
            return Err(ServiceError::InvalidCredentials);
        }

        let principal = SessionPrincipal {
            account_id: account.account_id,
            username: account.username,
            is_admin: account.is_admin,
        };
        let token = self.sessions.issue(principal.clone());

        // A delete that committed after the password check has already run its
        // session revocation; drop the token issued behind its back.
        let exists = self.credentials.account_exists(principal.account_id).await;
        if !matches!(exists, Ok(true)) {
            self.sessions.revoke(token.as_str());
            exists?;
            record_login("invalid_credentials");
            warn!(account_id = %principal.account_id, "Login abandoned: account removed");
            return Err(ServiceError::InvalidCredentials);
        }

        record_login("success");
        info!(account_id = %principal.account_id, is_admin = principal.is_admin, "Login succeeded");
        Ok(IssuedSession { token, principal })
    }

    /// Discard the session behind `token`, if any.
    pub fn logout(&self, token: &str) -> bool {
        let removed = self.sessions.revoke(token);
        if removed {
            info!("Session ended");
        }
        removed
    }

    pub fn resolve(&self, token: &str) -> Session {
        self.sessions.resolve(token)
    }

    /// Apply the password-change policy. `keep` names a token that survives
    /// revocation, typically the caller's own.
    pub fn password_changed(&self, account_id: Uuid, keep: Option<&str>) -> usize {
        if !self.policy.revoke_on_password_change {
            return 0;
        }
        let revoked = self.sessions.revoke_account(account_id, keep);
        info!(%account_id, revoked, "Sessions revoked after password change");
        revoked
    }

    /// Drop every session of a deleted account.
    pub fn account_removed(&self, account_id: Uuid) -> usize {
        let revoked = self.sessions.revoke_account(account_id, None);
        if revoked > 0 {
            info!(%account_id, revoked, "Sessions revoked after account deletion");
        }
        revoked
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{credential_store, new_account};
    use chrono::Duration;

    fn authenticator(policy: SessionPolicy) -> (CredentialStore, SessionAuthenticator) {
        let (_, credentials, _) = credential_store();
        let sessions = SessionRegistry::new(Duration::minutes(30));
        (
            credentials.clone(),
            SessionAuthenticator::new(credentials, sessions, policy),
        )
    }

    #[tokio::test]
    async fn test_login_snapshots_admin_flag() {
        let (credentials, auth) = authenticator(SessionPolicy::default());
        let alice = credentials
            .create_account(new_account("alice", "alice@x.com", "secret1"))
            .await
            .unwrap();

        let first = auth
            .login("alice", &Password::new("secret1"))
            .await
            .unwrap();
        assert!(!first.principal.is_admin);

        credentials.set_admin(alice.account_id, true).await.unwrap();

        let stale = auth.resolve(first.token.as_str());
        assert!(!stale.principal().unwrap().is_admin);

        let second = auth
            .login("alice", &Password::new("secret1"))
            .await
            .unwrap();
        assert!(second.principal.is_admin);
    }

    #[tokio::test]
    async fn test_unknown_user_and_wrong_password_look_the_same() {
        let (credentials, auth) = authenticator(SessionPolicy::default());
        credentials
            .create_account(new_account("alice", "alice@x.com", "secret1"))
            .await
            .unwrap();

        let unknown = auth
            .login("mallory", &Password::new("secret1"))
            .await
            .unwrap_err();
        let wrong = auth
            .login("alice", &Password::new("secret2"))
            .await
            .unwrap_err();

        assert!(matches!(unknown, ServiceError::InvalidCredentials));
        assert!(matches!(wrong, ServiceError::InvalidCredentials));
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[tokio::test]
    async fn test_inactive_account_cannot_login() {
        let (credentials, auth) = authenticator(SessionPolicy::default());
        let mut request = new_account("alice", "alice@x.com", "secret1");
        request.is_active = false;
        credentials.create_account(request).await.unwrap();

        let err = auth
            .login("alice", &Password::new("secret1"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::AccountInactive));
        assert_eq!(auth.sessions().active_count(), 0);
    }

    #[tokio::test]
    async fn test_logout_discards_session() {
        let (credentials, auth) = authenticator(SessionPolicy::default());
        credentials
            .create_account(new_account("alice", "alice@x.com", "secret1"))
            .await
            .unwrap();

        let issued = auth
            .login("alice", &Password::new("secret1"))
            .await
            .unwrap();
        assert!(auth.resolve(issued.token.as_str()).is_authenticated());

        assert!(auth.logout(issued.token.as_str()));
        assert_eq!(auth.resolve(issued.token.as_str()), Session::Anonymous);
        assert!(!auth.logout(issued.token.as_str()));
    }

    #[tokio::test]
    async fn test_password_change_policy() {
        let (credentials, keep_sessions) = authenticator(SessionPolicy::default());
        let alice = credentials
            .create_account(new_account("alice", "alice@x.com", "secret1"))
            .await
            .unwrap();
        let issued = keep_sessions
            .login("alice", &Password::new("secret1"))
            .await
            .unwrap();
        assert_eq!(keep_sessions.password_changed(alice.account_id, None), 0);
        assert!(keep_sessions
            .resolve(issued.token.as_str())
            .is_authenticated());

        let (credentials, revoke) = authenticator(SessionPolicy {
            revoke_on_password_change: true,
        });
        let bob = credentials
            .create_account(new_account("bob", "bob@x.com", "secret1"))
            .await
            .unwrap();
        let issued = revoke
            .login("bob", &Password::new("secret1"))
            .await
            .unwrap();
        assert_eq!(revoke.password_changed(bob.account_id, None), 1);
        assert_eq!(revoke.resolve(issued.token.as_str()), Session::Anonymous);
    }

    #[tokio::test]
    async fn test_login_racing_delete_leaves_no_session() {
        let (credentials, auth) = authenticator(SessionPolicy::default());

        for round in 0..20 {
            let username = format!("user{}", round);
            let account = credentials
                .create_account(new_account(&username, &format!("{}@x.com", username), "secret1"))
                .await
                .unwrap();
            let account_id = account.account_id;

            let password = Password::new("secret1");
            let (login, _) = tokio::join!(auth.login(&username, &password), async {
                tokio::task::yield_now().await;
                credentials.delete_account(account_id).await.unwrap();
                auth.account_removed(account_id);
            });

            if let Ok(issued) = login {
                assert_eq!(auth.resolve(issued.token.as_str()), Session::Anonymous);
            }
            assert_eq!(auth.sessions().active_count(), 0);
        }
    }

    #[tokio::test]
    async fn test_account_removed_revokes_sessions() {
        let (credentials, auth) = authenticator(SessionPolicy::default());
        let alice = credentials
            .create_account(new_account("alice", "alice@x.com", "secret1"))
            .await
            .unwrap();
        let issued = auth
            .login("alice", &Password::new("secret1"))
            .await
            .unwrap();

        assert_eq!(auth.account_removed(alice.account_id), 1);
        assert_eq!(auth.resolve(issued.token.as_str()), Session::Anonymous);
    }
}
