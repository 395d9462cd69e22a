//! Account records and password hashing.
//!
//! Plaintext passwords enter as [`Password`] and are hashed before a unit of
//! work is opened; only the PHC string ever reaches storage.

use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::models::{Account, AccountChanges, AccountResponse, AccountStats, NewAccount};
use crate::services::{MembershipGraph, ServiceError};
use crate::store::{IdentityStore, UnitOfWork};
use crate::utils::validation::{normalize_email, normalize_username, require_password};
use crate::utils::{CredentialHasher, Password};

#[derive(Clone)]
pub struct CredentialStore {
    store: Arc<dyn IdentityStore>,
    hasher: CredentialHasher,
    membership: MembershipGraph,
}

impl CredentialStore {
    pub fn new(
        store: Arc<dyn IdentityStore>,
        hasher: CredentialHasher,
        membership: MembershipGraph,
    ) -> Self {
        Self {
            store,
            hasher,
            membership,
        }
    }

    /// Create an account and attach its initial groups in one unit of work.
    #[instrument(skip(self, new_account), fields(username = %new_account.username))]
    pub async fn create_account(
        &self,
        new_account: NewAccount,
    ) -> Result<AccountResponse, ServiceError> {
        let username = normalize_username(&new_account.username)?;
        let email = normalize_email(&new_account.email)?;
        require_password(&new_account.password)?;

        let password_hash = self.hash(&new_account.password)?;
        let account = Account::new(
            username,
            email,
            password_hash,
            new_account.is_admin,
            new_account.is_active,
        );

        let mut uow = self.store.begin().await?;
        uow.insert_account(&account).await?;
        self.membership
            .attach_all(uow.as_mut(), account.account_id, &new_account.group_ids)
            .await?;
        let groups = uow.groups_of(account.account_id).await?;
        uow.commit().await?;

        info!(account_id = %account.account_id, "Account created");
        Ok(AccountResponse::with_groups(account, groups))
    }

    /// Apply a partial update. Uniqueness is only checked against other accounts.
    #[instrument(skip(self, changes))]
    pub async fn update_account(
        &self,
        account_id: Uuid,
        changes: AccountChanges,
    ) -> Result<AccountResponse, ServiceError> {
        let username = changes
            .username
            .as_deref()
            .map(normalize_username)
            .transpose()?;
        let email = changes.email.as_deref().map(normalize_email).transpose()?;
        let password_hash = match &changes.password {
            Some(password) => {
                require_password(password)?;
                Some(self.hash(password)?)
            }
            None => None,
        };

        let mut uow = self.store.begin().await?;
        let mut account = lock(uow.as_mut(), account_id).await?;

        if let Some(username) = username {
            account.username = username;
        }
        if let Some(email) = email {
            account.email = email;
        }
        if let Some(password_hash) = password_hash {
            account.password_hash = password_hash;
        }
        if let Some(is_admin) = changes.is_admin {
            account.is_admin = is_admin;
        }
        if let Some(is_active) = changes.is_active {
            account.is_active = is_active;
        }

        uow.update_account(&account).await?;
        if let Some(group_ids) = &changes.group_ids {
            self.membership
                .replace_within(uow.as_mut(), account_id, group_ids)
                .await?;
        }
        let groups = uow.groups_of(account_id).await?;
        uow.commit().await?;

        info!(%account_id, "Account updated");
        Ok(AccountResponse::with_groups(account, groups))
    }

    #[instrument(skip(self, password))]
    pub async fn set_password(
        &self,
        account_id: Uuid,
        password: &Password,
    ) -> Result<(), ServiceError> {
        require_password(password)?;
        let password_hash = self.hash(password)?;

        let mut uow = self.store.begin().await?;
        let mut account = lock(uow.as_mut(), account_id).await?;
        account.password_hash = password_hash;
        uow.update_account(&account).await?;
        uow.commit().await?;

        info!(%account_id, "Password reset");
        Ok(())
    }

    /// Check `candidate` against the stored hash. Unknown accounts run a dummy
    /// verification and report `false`.
    #[instrument(skip(self, candidate))]
    pub async fn verify_password(
        &self,
        account_id: Uuid,
        candidate: &Password,
    ) -> Result<bool, ServiceError> {
        let account = {
            let mut uow = self.store.begin().await?;
            uow.find_account(account_id).await?
        };

        match account {
            Some(account) => Ok(self.hasher.verify(candidate, &account.password_hash)),
            None => {
                self.hasher.verify_dummy(candidate);
                Ok(false)
            }
        }
    }

    pub(crate) fn verify_dummy(&self, candidate: &Password) {
        self.hasher.verify_dummy(candidate);
    }

    /// Delete an account together with every membership edge it has.
    #[instrument(skip(self))]
    pub async fn delete_account(&self, account_id: Uuid) -> Result<(), ServiceError> {
        let mut uow = self.store.begin().await?;
        lock(uow.as_mut(), account_id).await?;

        let detached = self
            .membership
            .detach_account(uow.as_mut(), account_id)
            .await?;
        if !uow.delete_account(account_id).await? {
            return Err(ServiceError::AccountNotFound);
        }
        uow.commit().await?;

        info!(%account_id, detached, "Account deleted");
        Ok(())
    }

    pub async fn set_active(
        &self,
        account_id: Uuid,
        is_active: bool,
    ) -> Result<AccountResponse, ServiceError> {
        self.modify_flags(account_id, |account| account.is_active = is_active)
            .await
    }

    pub async fn set_admin(
        &self,
        account_id: Uuid,
        is_admin: bool,
    ) -> Result<AccountResponse, ServiceError> {
        self.modify_flags(account_id, |account| account.is_admin = is_admin)
            .await
    }

    pub async fn toggle_active(&self, account_id: Uuid) -> Result<AccountResponse, ServiceError> {
        self.modify_flags(account_id, |account| account.is_active = !account.is_active)
            .await
    }

    pub async fn toggle_admin(&self, account_id: Uuid) -> Result<AccountResponse, ServiceError> {
        self.modify_flags(account_id, |account| account.is_admin = !account.is_admin)
            .await
    }

    pub async fn get_account(&self, account_id: Uuid) -> Result<AccountResponse, ServiceError> {
        let mut uow = self.store.begin().await?;
        let account = uow
            .find_account(account_id)
            .await?
            .ok_or(ServiceError::AccountNotFound)?;
        let groups = uow.groups_of(account_id).await?;
        Ok(AccountResponse::with_groups(account, groups))
    }

    /// All accounts with their groups, oldest first.
    pub async fn list_accounts(&self) -> Result<Vec<AccountResponse>, ServiceError> {
        let mut uow = self.store.begin().await?;
        let accounts = uow.list_accounts().await?;

        let mut responses = Vec::with_capacity(accounts.len());
        for account in accounts {
            let groups = uow.groups_of(account.account_id).await?;
            responses.push(AccountResponse::with_groups(account, groups));
        }
        Ok(responses)
    }

    pub(crate) async fn account_exists(&self, account_id: Uuid) -> Result<bool, ServiceError> {
        let mut uow = self.store.begin().await?;
        Ok(uow.find_account(account_id).await?.is_some())
    }

    pub(crate) async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Account>, ServiceError> {
        let mut uow = self.store.begin().await?;
        Ok(uow.find_account_by_username(username).await?)
    }

    /// Dashboard counters.
    pub async fn stats(&self) -> Result<AccountStats, ServiceError> {
        let mut uow = self.store.begin().await?;
        let mut stats = uow.account_stats().await?;
        stats.total_groups = uow.count_groups().await?;
        Ok(stats)
    }

    /// Read, modify and write an account's flags under one row lock.
    #[instrument(skip(self, modify))]
    async fn modify_flags<F>(
        &self,
        account_id: Uuid,
        modify: F,
    ) -> Result<AccountResponse, ServiceError>
    where
        F: FnOnce(&mut Account) + Send,
    {
        let mut uow = self.store.begin().await?;
        let mut account = lock(uow.as_mut(), account_id).await?;

        modify(&mut account);

        uow.update_account(&account).await?;
        let groups = uow.groups_of(account_id).await?;
        uow.commit().await?;

        info!(
            %account_id,
            is_active = account.is_active,
            is_admin = account.is_admin,
            "Account flags updated"
        );
        Ok(AccountResponse::with_groups(account, groups))
    }

    fn hash(&self, password: &Password) -> Result<String, ServiceError> {
        self.hasher
            .hash(password)
            .map(|hash| hash.into_string())
            .map_err(|e| {
                warn!("Password hashing failed");
                ServiceError::Internal(e)
            })
    }
}

async fn lock(uow: &mut dyn UnitOfWork, account_id: Uuid) -> Result<Account, ServiceError> {
    uow.lock_account(account_id)
        .await?
        .ok_or(ServiceError::AccountNotFound)
}
