//! In-process store used by tests and local development.
//!
//! A unit of work holds the store mutex for its whole lifetime and mutates a
//! private copy of the state; commit swaps the copy in. Units of work are
//! therefore fully serialized, and dropping one leaves the store untouched.

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{
    IdentityStore, StoreError, UnitOfWork, ACCOUNTS_EMAIL_KEY, ACCOUNTS_USERNAME_KEY,
    GROUPS_NAME_KEY, MEMBERSHIPS_ACCOUNT_FKEY, MEMBERSHIPS_GROUP_FKEY,
};
use crate::models::{Account, AccountStats, Group};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    accounts: HashMap<Uuid, Account>,
    groups: HashMap<Uuid, Group>,
    memberships: BTreeSet<(Uuid, Uuid)>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryUnitOfWork { guard, working }))
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

impl MemoryUnitOfWork {
    fn check_account_unique(&self, account: &Account) -> Result<(), StoreError> {
        for other in self.working.accounts.values() {
            if other.account_id == account.account_id {
                continue;
            }
            if other.username == account.username {
                return Err(StoreError::UniqueViolation(ACCOUNTS_USERNAME_KEY.to_string()));
            }
            if other.email == account.email {
                return Err(StoreError::UniqueViolation(ACCOUNTS_EMAIL_KEY.to_string()));
            }
        }
        Ok(())
    }

    fn check_group_unique(&self, group: &Group) -> Result<(), StoreError> {
        let taken = self
            .working
            .groups
            .values()
            .any(|other| other.group_id != group.group_id && other.name == group.name);
        if taken {
            return Err(StoreError::UniqueViolation(GROUPS_NAME_KEY.to_string()));
        }
        Ok(())
    }

    fn sorted_groups(&self, mut groups: Vec<Group>) -> Vec<Group> {
        groups.sort_by(|a, b| a.name.cmp(&b.name));
        groups
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn insert_account(&mut self, account: &Account) -> Result<(), StoreError> {
        if self.working.accounts.contains_key(&account.account_id) {
            return Err(StoreError::UniqueViolation("accounts_pkey".to_string()));
        }
        self.check_account_unique(account)?;
        self.working
            .accounts
            .insert(account.account_id, account.clone());
        Ok(())
    }

    async fn find_account(&mut self, account_id: Uuid) -> Result<Option<Account>, StoreError> {
        Ok(self.working.accounts.get(&account_id).cloned())
    }

    async fn lock_account(&mut self, account_id: Uuid) -> Result<Option<Account>, StoreError> {
        // The whole store is already held by this unit of work.
        self.find_account(account_id).await
    }

    async fn find_account_by_username(
        &mut self,
        username: &str,
    ) -> Result<Option<Account>, StoreError> {
        Ok(self
            .working
            .accounts
            .values()
            .find(|a| a.username == username)
            .cloned())
    }

    async fn list_accounts(&mut self) -> Result<Vec<Account>, StoreError> {
        let mut accounts: Vec<Account> = self.working.accounts.values().cloned().collect();
        accounts.sort_by(|a, b| {
            a.created_utc
                .cmp(&b.created_utc)
                .then_with(|| a.account_id.cmp(&b.account_id))
        });
        Ok(accounts)
    }

    async fn update_account(&mut self, account: &Account) -> Result<(), StoreError> {
        if !self.working.accounts.contains_key(&account.account_id) {
            return Ok(());
        }
        self.check_account_unique(account)?;
        self.working
            .accounts
            .insert(account.account_id, account.clone());
        Ok(())
    }

    async fn delete_account(&mut self, account_id: Uuid) -> Result<bool, StoreError> {
        if self
            .working
            .memberships
            .iter()
            .any(|(a, _)| *a == account_id)
        {
            return Err(StoreError::ForeignKeyViolation(
                MEMBERSHIPS_ACCOUNT_FKEY.to_string(),
            ));
        }
        Ok(self.working.accounts.remove(&account_id).is_some())
    }

    async fn account_stats(&mut self) -> Result<AccountStats, StoreError> {
        let accounts = self.working.accounts.values();
        let (mut total, mut active, mut admins) = (0, 0, 0);
        for account in accounts {
            total += 1;
            if account.is_active {
                active += 1;
            }
            if account.is_admin {
                admins += 1;
            }
        }
        Ok(AccountStats {
            total_accounts: total,
            active_accounts: active,
            admin_accounts: admins,
            total_groups: 0,
        })
    }

    async fn insert_group(&mut self, group: &Group) -> Result<(), StoreError> {
        if self.working.groups.contains_key(&group.group_id) {
            return Err(StoreError::UniqueViolation("groups_pkey".to_string()));
        }
        self.check_group_unique(group)?;
        self.working.groups.insert(group.group_id, group.clone());
        Ok(())
    }

    async fn find_group(&mut self, group_id: Uuid) -> Result<Option<Group>, StoreError> {
        Ok(self.working.groups.get(&group_id).cloned())
    }

    async fn lock_group(&mut self, group_id: Uuid) -> Result<Option<Group>, StoreError> {
        self.find_group(group_id).await
    }

    async fn find_groups(&mut self, group_ids: &[Uuid]) -> Result<Vec<Group>, StoreError> {
        let wanted: BTreeSet<&Uuid> = group_ids.iter().collect();
        let found = wanted
            .into_iter()
            .filter_map(|id| self.working.groups.get(id).cloned())
            .collect();
        Ok(self.sorted_groups(found))
    }

    async fn list_groups(&mut self) -> Result<Vec<Group>, StoreError> {
        let groups = self.working.groups.values().cloned().collect();
        Ok(self.sorted_groups(groups))
    }

    async fn update_group(&mut self, group: &Group) -> Result<(), StoreError> {
        if !self.working.groups.contains_key(&group.group_id) {
            return Ok(());
        }
        self.check_group_unique(group)?;
        self.working.groups.insert(group.group_id, group.clone());
        Ok(())
    }

    async fn delete_group(&mut self, group_id: Uuid) -> Result<bool, StoreError> {
        if self.working.memberships.iter().any(|(_, g)| *g == group_id) {
            return Err(StoreError::ForeignKeyViolation(
                MEMBERSHIPS_GROUP_FKEY.to_string(),
            ));
        }
        Ok(self.working.groups.remove(&group_id).is_some())
    }

    async fn count_groups(&mut self) -> Result<i64, StoreError> {
        Ok(self.working.groups.len() as i64)
    }

    async fn insert_membership(
        &mut self,
        account_id: Uuid,
        group_id: Uuid,
    ) -> Result<bool, StoreError> {
        if !self.working.accounts.contains_key(&account_id) {
            return Err(StoreError::ForeignKeyViolation(
                MEMBERSHIPS_ACCOUNT_FKEY.to_string(),
            ));
        }
        if !self.working.groups.contains_key(&group_id) {
            return Err(StoreError::ForeignKeyViolation(
                MEMBERSHIPS_GROUP_FKEY.to_string(),
            ));
        }
        Ok(self.working.memberships.insert((account_id, group_id)))
    }

    async fn delete_membership(
        &mut self,
        account_id: Uuid,
        group_id: Uuid,
    ) -> Result<bool, StoreError> {
        Ok(self.working.memberships.remove(&(account_id, group_id)))
    }

    async fn delete_memberships_of_account(
        &mut self,
        account_id: Uuid,
    ) -> Result<u64, StoreError> {
        let before = self.working.memberships.len();
        self.working.memberships.retain(|(a, _)| *a != account_id);
        Ok((before - self.working.memberships.len()) as u64)
    }

    async fn delete_memberships_of_group(&mut self, group_id: Uuid) -> Result<u64, StoreError> {
        let before = self.working.memberships.len();
        self.working.memberships.retain(|(_, g)| *g != group_id);
        Ok((before - self.working.memberships.len()) as u64)
    }

    async fn group_ids_of(&mut self, account_id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        Ok(self
            .working
            .memberships
            .iter()
            .filter(|(a, _)| *a == account_id)
            .map(|(_, g)| *g)
            .collect())
    }

    async fn groups_of(&mut self, account_id: Uuid) -> Result<Vec<Group>, StoreError> {
        let ids = self.group_ids_of(account_id).await?;
        self.find_groups(&ids).await
    }

    async fn members_of(&mut self, group_id: Uuid) -> Result<Vec<Account>, StoreError> {
        let mut members: Vec<Account> = self
            .working
            .memberships
            .iter()
            .filter(|(_, g)| *g == group_id)
            .filter_map(|(a, _)| self.working.accounts.get(a).cloned())
            .collect();
        members.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(members)
    }

    async fn member_count(&mut self, group_id: Uuid) -> Result<i64, StoreError> {
        Ok(self
            .working
            .memberships
            .iter()
            .filter(|(_, g)| *g == group_id)
            .count() as i64)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryUnitOfWork { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}
