//! PostgreSQL store.
//!
//! Each unit of work is one database transaction. Uniqueness is arbitrated by
//! the `accounts_*_key` / `groups_name_key` constraints; row locks
//! (`FOR UPDATE`) serialize read-modify-write operations on the same row.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

use super::{IdentityStore, StoreError, UnitOfWork};
use crate::config::DatabaseConfig;
use crate::models::{Account, AccountStats, Group};

/// PostgreSQL connection pool wrapper.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new database connection pool.
    #[instrument(skip(config), fields(max_connections = config.max_connections))]
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        info!("Connecting to PostgreSQL");

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(1800))
            .connect(&config.url)
            .await?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Apply the bundled schema migrations.
    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

#[async_trait]
impl IdentityStore for PostgresStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

const ACCOUNT_COLUMNS: &str =
    "account_id, username, email, password_hash, is_admin, is_active, created_utc";

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    // ==================== Accounts ====================

    async fn insert_account(&mut self, account: &Account) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO accounts (account_id, username, email, password_hash, is_admin, is_active, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(account.account_id)
        .bind(&account.username)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(account.is_admin)
        .bind(account.is_active)
        .bind(account.created_utc)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn find_account(&mut self, account_id: Uuid) -> Result<Option<Account>, StoreError> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE account_id = $1");
        Ok(sqlx::query_as::<_, Account>(&sql)
            .bind(account_id)
            .fetch_optional(&mut *self.tx)
            .await?)
    }

    async fn lock_account(&mut self, account_id: Uuid) -> Result<Option<Account>, StoreError> {
        let sql =
            format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE account_id = $1 FOR UPDATE");
        Ok(sqlx::query_as::<_, Account>(&sql)
            .bind(account_id)
            .fetch_optional(&mut *self.tx)
            .await?)
    }

    async fn find_account_by_username(
        &mut self,
        username: &str,
    ) -> Result<Option<Account>, StoreError> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE username = $1");
        Ok(sqlx::query_as::<_, Account>(&sql)
            .bind(username)
            .fetch_optional(&mut *self.tx)
            .await?)
    }

    async fn list_accounts(&mut self) -> Result<Vec<Account>, StoreError> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts ORDER BY created_utc, account_id");
        Ok(sqlx::query_as::<_, Account>(&sql)
            .fetch_all(&mut *self.tx)
            .await?)
    }

    async fn update_account(&mut self, account: &Account) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE accounts
            SET username = $2, email = $3, password_hash = $4, is_admin = $5, is_active = $6
            WHERE account_id = $1
            "#,
        )
        .bind(account.account_id)
        .bind(&account.username)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(account.is_admin)
        .bind(account.is_active)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn delete_account(&mut self, account_id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM accounts WHERE account_id = $1")
            .bind(account_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn account_stats(&mut self) -> Result<AccountStats, StoreError> {
        let (total, active, admins): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COUNT(*) FILTER (WHERE is_active),
                   COUNT(*) FILTER (WHERE is_admin)
            FROM accounts
            "#,
        )
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(AccountStats {
            total_accounts: total,
            active_accounts: active,
            admin_accounts: admins,
            total_groups: 0,
        })
    }

    // ==================== Groups ====================

    async fn insert_group(&mut self, group: &Group) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO groups (group_id, name, description, created_utc)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(group.group_id)
        .bind(&group.name)
        .bind(&group.description)
        .bind(group.created_utc)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn find_group(&mut self, group_id: Uuid) -> Result<Option<Group>, StoreError> {
        Ok(
            sqlx::query_as::<_, Group>("SELECT * FROM groups WHERE group_id = $1")
                .bind(group_id)
                .fetch_optional(&mut *self.tx)
                .await?,
        )
    }

    async fn lock_group(&mut self, group_id: Uuid) -> Result<Option<Group>, StoreError> {
        Ok(
            sqlx::query_as::<_, Group>("SELECT * FROM groups WHERE group_id = $1 FOR UPDATE")
                .bind(group_id)
                .fetch_optional(&mut *self.tx)
                .await?,
        )
    }

    async fn find_groups(&mut self, group_ids: &[Uuid]) -> Result<Vec<Group>, StoreError> {
        Ok(sqlx::query_as::<_, Group>(
            "SELECT * FROM groups WHERE group_id = ANY($1) ORDER BY name",
        )
        .bind(group_ids.to_vec())
        .fetch_all(&mut *self.tx)
        .await?)
    }

    async fn list_groups(&mut self) -> Result<Vec<Group>, StoreError> {
        Ok(
            sqlx::query_as::<_, Group>("SELECT * FROM groups ORDER BY name")
                .fetch_all(&mut *self.tx)
                .await?,
        )
    }

    async fn update_group(&mut self, group: &Group) -> Result<(), StoreError> {
        sqlx::query("UPDATE groups SET name = $2, description = $3 WHERE group_id = $1")
            .bind(group.group_id)
            .bind(&group.name)
            .bind(&group.description)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn delete_group(&mut self, group_id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM groups WHERE group_id = $1")
            .bind(group_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_groups(&mut self) -> Result<i64, StoreError> {
        Ok(sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM groups")
            .fetch_one(&mut *self.tx)
            .await?)
    }

    // ==================== Memberships ====================

    async fn insert_membership(
        &mut self,
        account_id: Uuid,
        group_id: Uuid,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "INSERT INTO memberships (account_id, group_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(account_id)
        .bind(group_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_membership(
        &mut self,
        account_id: Uuid,
        group_id: Uuid,
    ) -> Result<bool, StoreError> {
        let result =
            sqlx::query("DELETE FROM memberships WHERE account_id = $1 AND group_id = $2")
                .bind(account_id)
                .bind(group_id)
                .execute(&mut *self.tx)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_memberships_of_account(
        &mut self,
        account_id: Uuid,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM memberships WHERE account_id = $1")
            .bind(account_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_memberships_of_group(&mut self, group_id: Uuid) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM memberships WHERE group_id = $1")
            .bind(group_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn group_ids_of(&mut self, account_id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        Ok(sqlx::query_scalar::<_, Uuid>(
            "SELECT group_id FROM memberships WHERE account_id = $1",
        )
        .bind(account_id)
        .fetch_all(&mut *self.tx)
        .await?)
    }

    async fn groups_of(&mut self, account_id: Uuid) -> Result<Vec<Group>, StoreError> {
        Ok(sqlx::query_as::<_, Group>(
            r#"
            SELECT g.* FROM groups g
            JOIN memberships m ON m.group_id = g.group_id
            WHERE m.account_id = $1
            ORDER BY g.name
            "#,
        )
        .bind(account_id)
        .fetch_all(&mut *self.tx)
        .await?)
    }

    async fn members_of(&mut self, group_id: Uuid) -> Result<Vec<Account>, StoreError> {
        Ok(sqlx::query_as::<_, Account>(
            r#"
            SELECT a.account_id, a.username, a.email, a.password_hash, a.is_admin, a.is_active, a.created_utc
            FROM accounts a
            JOIN memberships m ON m.account_id = a.account_id
            WHERE m.group_id = $1
            ORDER BY a.username
            "#,
        )
        .bind(group_id)
        .fetch_all(&mut *self.tx)
        .await?)
    }

    async fn member_count(&mut self, group_id: Uuid) -> Result<i64, StoreError> {
        Ok(
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM memberships WHERE group_id = $1")
                .bind(group_id)
                .fetch_one(&mut *self.tx)
                .await?,
        )
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }
}
