use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::models::{Group, GroupChanges, GroupResponse, NewGroup};
use crate::services::{MembershipGraph, ServiceError};
use crate::store::{IdentityStore, UnitOfWork};
use crate::utils::validation::normalize_group_name;

/// Owns group records.
#[derive(Clone)]
pub struct GroupRegistry {
    store: Arc<dyn IdentityStore>,
    membership: MembershipGraph,
}

impl GroupRegistry {
    pub fn new(store: Arc<dyn IdentityStore>, membership: MembershipGraph) -> Self {
        Self { store, membership }
    }

    #[instrument(skip(self, new_group), fields(name = %new_group.name))]
    pub async fn create_group(&self, new_group: NewGroup) -> Result<GroupResponse, ServiceError> {
        let name = normalize_group_name(&new_group.name)?;
        let group = Group::new(name, new_group.description.trim().to_string());

        let mut uow = self.store.begin().await?;
        uow.insert_group(&group).await?;
        uow.commit().await?;

        info!(group_id = %group.group_id, "Group created");
        Ok(GroupResponse {
            group,
            member_count: 0,
        })
    }

    #[instrument(skip(self, changes))]
    pub async fn update_group(
        &self,
        group_id: Uuid,
        changes: GroupChanges,
    ) -> Result<GroupResponse, ServiceError> {
        let name = changes
            .name
            .as_deref()
            .map(normalize_group_name)
            .transpose()?;

        let mut uow = self.store.begin().await?;
        let mut group = uow
            .lock_group(group_id)
            .await?
            .ok_or(ServiceError::GroupNotFound)?;

        if let Some(name) = name {
            group.name = name;
        }
        if let Some(description) = changes.description {
            group.description = description.trim().to_string();
        }

        uow.update_group(&group).await?;
        let member_count = uow.member_count(group_id).await?;
        uow.commit().await?;

        info!(%group_id, "Group updated");
        Ok(GroupResponse {
            group,
            member_count,
        })
    }

    /// Delete a group together with every membership edge pointing at it.
    #[instrument(skip(self))]
    pub async fn delete_group(&self, group_id: Uuid) -> Result<(), ServiceError> {
        let mut uow = self.store.begin().await?;
        uow.lock_group(group_id)
            .await?
            .ok_or(ServiceError::GroupNotFound)?;

        let detached = self.membership.detach_group(uow.as_mut(), group_id).await?;
        if !uow.delete_group(group_id).await? {
            return Err(ServiceError::GroupNotFound);
        }
        uow.commit().await?;

        info!(%group_id, detached, "Group deleted");
        Ok(())
    }

    pub async fn get_group(&self, group_id: Uuid) -> Result<GroupResponse, ServiceError> {
        let mut uow = self.store.begin().await?;
        let group = uow
            .find_group(group_id)
            .await?
            .ok_or(ServiceError::GroupNotFound)?;
        with_member_count(uow.as_mut(), group).await
    }

    /// All groups, ordered by name.
    pub async fn list_groups(&self) -> Result<Vec<GroupResponse>, ServiceError> {
        let mut uow = self.store.begin().await?;
        let groups = uow.list_groups().await?;

        let mut responses = Vec::with_capacity(groups.len());
        for group in groups {
            responses.push(with_member_count(uow.as_mut(), group).await?);
        }
        Ok(responses)
    }
}

async fn with_member_count(
    uow: &mut dyn UnitOfWork,
    group: Group,
) -> Result<GroupResponse, ServiceError> {
    let member_count = uow.member_count(group.group_id).await?;
    Ok(GroupResponse {
        group,
        member_count,
    })
}
