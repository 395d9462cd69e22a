//! Account-to-group edges.
//!
//! This is the only component that writes the `memberships` table. Deleting
//! components cascade through the crate-private `detach_*` hooks, which only
//! accept the caller's live unit of work.

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::models::{Account, Group};
use crate::services::ServiceError;
use crate::store::{IdentityStore, UnitOfWork};

#[derive(Clone)]
pub struct MembershipGraph {
    store: Arc<dyn IdentityStore>,
}

impl MembershipGraph {
    pub fn new(store: Arc<dyn IdentityStore>) -> Self {
        Self { store }
    }

    /// Add `account_id` to `group_id`. Adding an existing edge is a no-op.
    #[instrument(skip(self))]
    pub async fn add_membership(&self, account_id: Uuid, group_id: Uuid) -> Result<(), ServiceError> {
        let mut uow = self.store.begin().await?;
        require_endpoints(uow.as_mut(), account_id, group_id).await?;

        let inserted = uow.insert_membership(account_id, group_id).await?;
        uow.commit().await?;

        if inserted {
            info!(%account_id, %group_id, "Membership added");
        }
        Ok(())
    }

    /// Remove `account_id` from `group_id`. Removing a missing edge is a no-op.
    #[instrument(skip(self))]
    pub async fn remove_membership(
        &self,
        account_id: Uuid,
        group_id: Uuid,
    ) -> Result<(), ServiceError> {
        let mut uow = self.store.begin().await?;
        require_endpoints(uow.as_mut(), account_id, group_id).await?;

        let removed = uow.delete_membership(account_id, group_id).await?;
        uow.commit().await?;

        if removed {
            info!(%account_id, %group_id, "Membership removed");
        }
        Ok(())
    }

    /// Add several edges at once; all groups must exist or nothing changes.
    #[instrument(skip(self, group_ids), fields(group_count = group_ids.len()))]
    pub async fn add_memberships(
        &self,
        account_id: Uuid,
        group_ids: &[Uuid],
    ) -> Result<Vec<Group>, ServiceError> {
        let mut uow = self.store.begin().await?;
        lock_account(uow.as_mut(), account_id).await?;

        let added = self.attach_all(uow.as_mut(), account_id, group_ids).await?;
        let groups = uow.groups_of(account_id).await?;
        uow.commit().await?;

        info!(%account_id, added, "Memberships added");
        Ok(groups)
    }

    /// Make the account's group set exactly `group_ids`. The account row stays
    /// locked until commit, so concurrent replacements apply one after another.
    #[instrument(skip(self, group_ids), fields(group_count = group_ids.len()))]
    pub async fn replace_groups_of(
        &self,
        account_id: Uuid,
        group_ids: &[Uuid],
    ) -> Result<Vec<Group>, ServiceError> {
        let mut uow = self.store.begin().await?;
        lock_account(uow.as_mut(), account_id).await?;

        self.replace_within(uow.as_mut(), account_id, group_ids)
            .await?;
        let groups = uow.groups_of(account_id).await?;
        uow.commit().await?;

        Ok(groups)
    }

    /// Groups of an account, ordered by name.
    pub async fn groups_of(&self, account_id: Uuid) -> Result<Vec<Group>, ServiceError> {
        let mut uow = self.store.begin().await?;
        require_account(uow.as_mut(), account_id).await?;
        Ok(uow.groups_of(account_id).await?)
    }

    /// Members of a group, ordered by username.
    pub async fn members_of(&self, group_id: Uuid) -> Result<Vec<Account>, ServiceError> {
        let mut uow = self.store.begin().await?;
        require_group(uow.as_mut(), group_id).await?;
        Ok(uow.members_of(group_id).await?)
    }

    /// Insert an edge to every group in `group_ids`, which must all exist.
    /// Returns how many edges were new.
    pub(crate) async fn attach_all(
        &self,
        uow: &mut dyn UnitOfWork,
        account_id: Uuid,
        group_ids: &[Uuid],
    ) -> Result<usize, ServiceError> {
        let wanted = require_groups(uow, group_ids).await?;

        let mut added = 0;
        for group_id in wanted {
            if uow.insert_membership(account_id, group_id).await? {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Diff the current edge set against `group_ids` and apply only the difference.
    pub(crate) async fn replace_within(
        &self,
        uow: &mut dyn UnitOfWork,
        account_id: Uuid,
        group_ids: &[Uuid],
    ) -> Result<(), ServiceError> {
        let wanted = require_groups(uow, group_ids).await?;
        let current: BTreeSet<Uuid> = uow.group_ids_of(account_id).await?.into_iter().collect();

        let mut removed = 0;
        for group_id in current.difference(&wanted) {
            if uow.delete_membership(account_id, *group_id).await? {
                removed += 1;
            }
        }

        let mut added = 0;
        for group_id in wanted.difference(&current) {
            if uow.insert_membership(account_id, *group_id).await? {
                added += 1;
            }
        }

        info!(%account_id, added, removed, "Group set replaced");
        Ok(())
    }

    /// Cascade hook for account deletion.
    pub(crate) async fn detach_account(
        &self,
        uow: &mut dyn UnitOfWork,
        account_id: Uuid,
    ) -> Result<u64, ServiceError> {
        Ok(uow.delete_memberships_of_account(account_id).await?)
    }

    /// Cascade hook for group deletion.
    pub(crate) async fn detach_group(
        &self,
        uow: &mut dyn UnitOfWork,
        group_id: Uuid,
    ) -> Result<u64, ServiceError> {
        Ok(uow.delete_memberships_of_group(group_id).await?)
    }
}

async fn require_account(uow: &mut dyn UnitOfWork, account_id: Uuid) -> Result<(), ServiceError> {
    uow.find_account(account_id)
        .await?
        .map(|_| ())
        .ok_or(ServiceError::AccountNotFound)
}

/// Existence check that also holds the account row until the unit of work ends.
async fn lock_account(uow: &mut dyn UnitOfWork, account_id: Uuid) -> Result<(), ServiceError> {
    uow.lock_account(account_id)
        .await?
        .map(|_| ())
        .ok_or(ServiceError::AccountNotFound)
}

async fn require_group(uow: &mut dyn UnitOfWork, group_id: Uuid) -> Result<(), ServiceError> {
    uow.find_group(group_id)
        .await?
        .map(|_| ())
        .ok_or(ServiceError::GroupNotFound)
}

async fn require_endpoints(
    uow: &mut dyn UnitOfWork,
    account_id: Uuid,
    group_id: Uuid,
) -> Result<(), ServiceError> {
    require_account(uow, account_id).await?;
    require_group(uow, group_id).await
}

/// Deduplicate `group_ids` and fail with `GroupNotFound` if any is unknown.
async fn require_groups(
    uow: &mut dyn UnitOfWork,
    group_ids: &[Uuid],
) -> Result<BTreeSet<Uuid>, ServiceError> {
    let wanted: BTreeSet<Uuid> = group_ids.iter().copied().collect();
    if wanted.is_empty() {
        return Ok(wanted);
    }

    let ids: Vec<Uuid> = wanted.iter().copied().collect();
    let found = uow.find_groups(&ids).await?;
    if found.len() != wanted.len() {
        return Err(ServiceError::GroupNotFound);
    }
    Ok(wanted)
}
