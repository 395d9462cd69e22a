//! Persistence seam for the identity core.
//!
//! Every public service operation opens one [`UnitOfWork`], performs all of its
//! reads and writes through it, and commits. Dropping a unit of work without
//! committing discards every change made through it.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Account, AccountStats, Group};

pub const ACCOUNTS_USERNAME_KEY: &str = "accounts_username_key";
pub const ACCOUNTS_EMAIL_KEY: &str = "accounts_email_key";
pub const GROUPS_NAME_KEY: &str = "groups_name_key";
pub const MEMBERSHIPS_ACCOUNT_FKEY: &str = "memberships_account_id_fkey";
pub const MEMBERSHIPS_GROUP_FKEY: &str = "memberships_group_id_fkey";

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique constraint rejected the write; carries the constraint name.
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    /// A write referenced a missing row, or removed a row still referenced.
    #[error("foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),

    #[error("storage backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            let constraint = db_err.constraint().unwrap_or_default().to_string();
            if db_err.is_unique_violation() {
                return StoreError::UniqueViolation(constraint);
            }
            if db_err.is_foreign_key_violation() {
                return StoreError::ForeignKeyViolation(constraint);
            }
        }
        StoreError::Backend(anyhow::Error::new(err))
    }
}

/// Factory for units of work.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}

/// One atomic unit of reads and writes against the store.
#[async_trait]
pub trait UnitOfWork: Send {
    // ==================== Accounts ====================

    async fn insert_account(&mut self, account: &Account) -> Result<(), StoreError>;

    async fn find_account(&mut self, account_id: Uuid) -> Result<Option<Account>, StoreError>;

    /// Like `find_account`, but holds the row against concurrent writers
    /// until this unit of work ends.
    async fn lock_account(&mut self, account_id: Uuid) -> Result<Option<Account>, StoreError>;

    async fn find_account_by_username(
        &mut self,
        username: &str,
    ) -> Result<Option<Account>, StoreError>;

    async fn list_accounts(&mut self) -> Result<Vec<Account>, StoreError>;

    async fn update_account(&mut self, account: &Account) -> Result<(), StoreError>;

    /// Returns `false` when no row matched.
    async fn delete_account(&mut self, account_id: Uuid) -> Result<bool, StoreError>;

    /// Account counters; `total_groups` is left at zero.
    async fn account_stats(&mut self) -> Result<AccountStats, StoreError>;

    // ==================== Groups ====================

    async fn insert_group(&mut self, group: &Group) -> Result<(), StoreError>;

    async fn find_group(&mut self, group_id: Uuid) -> Result<Option<Group>, StoreError>;

    async fn lock_group(&mut self, group_id: Uuid) -> Result<Option<Group>, StoreError>;

    /// Fetch the subset of `group_ids` that exist.
    async fn find_groups(&mut self, group_ids: &[Uuid]) -> Result<Vec<Group>, StoreError>;

    async fn list_groups(&mut self) -> Result<Vec<Group>, StoreError>;

    async fn update_group(&mut self, group: &Group) -> Result<(), StoreError>;

    async fn delete_group(&mut self, group_id: Uuid) -> Result<bool, StoreError>;

    async fn count_groups(&mut self) -> Result<i64, StoreError>;

    // ==================== Memberships ====================

    /// Returns `false` when the edge already existed.
    async fn insert_membership(
        &mut self,
        account_id: Uuid,
        group_id: Uuid,
    ) -> Result<bool, StoreError>;

    /// Returns `false` when there was no such edge.
    async fn delete_membership(
        &mut self,
        account_id: Uuid,
        group_id: Uuid,
    ) -> Result<bool, StoreError>;

    async fn delete_memberships_of_account(&mut self, account_id: Uuid)
        -> Result<u64, StoreError>;

    async fn delete_memberships_of_group(&mut self, group_id: Uuid) -> Result<u64, StoreError>;

    async fn group_ids_of(&mut self, account_id: Uuid) -> Result<Vec<Uuid>, StoreError>;

    /// Groups of an account, ordered by name.
    async fn groups_of(&mut self, account_id: Uuid) -> Result<Vec<Group>, StoreError>;

    /// Members of a group, ordered by username.
    async fn members_of(&mut self, group_id: Uuid) -> Result<Vec<Account>, StoreError>;

    async fn member_count(&mut self, group_id: Uuid) -> Result<i64, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
