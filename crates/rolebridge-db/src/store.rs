//! `PostgreSQL` membership store.

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use std::time::Duration;
use tracing::{debug, instrument};

use rolebridge_core::{
    GroupKey, Member, MemberSet, MembershipStore, MembershipTransaction, ProfileId, StorageError,
    StorageResult,
};

use crate::error::{map_sqlx_error, DbError};

/// Membership store backed by the `employee_okta_groups` table.
#[derive(Debug, Clone)]
pub struct PgMembershipStore {
    pool: PgPool,
}

impl PgMembershipStore {
    /// Wrap an existing pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a new pool.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, DbError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(url)
            .await
            .map_err(DbError::ConnectionFailed)?;
        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl MembershipStore for PgMembershipStore {
    #[instrument(skip(self))]
    async fn fetch_members(&self, group: &GroupKey) -> StorageResult<MemberSet> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            r"
            SELECT e.okta_id, e.email
            FROM employee_okta_groups m
            JOIN employees e ON e.okta_id = m.employee_okta_id
            WHERE m.group_name = $1
            ",
        )
        .bind(group.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch members", e))?;

        debug!(count = rows.len(), "Fetched group members");
        Ok(rows
            .into_iter()
            .map(|(id, email)| Member::new(id, email))
            .collect())
    }

    async fn begin(&self) -> StorageResult<Box<dyn MembershipTransaction>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin transaction", e))?;
        debug!("Database transaction started");
        Ok(Box::new(PgMembershipTransaction { tx }))
    }
}

/// An open database transaction.
///
/// Dropping it without commit rolls back (sqlx returns the connection with a
/// pending `ROLLBACK`).
pub struct PgMembershipTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl MembershipTransaction for PgMembershipTransaction {
    #[instrument(skip(self))]
    async fn add_member(&mut self, group: &GroupKey, member: &ProfileId) -> StorageResult<()> {
        sqlx::query(
            r"
            INSERT INTO okta_groups (name)
            VALUES ($1)
            ON CONFLICT (name) DO NOTHING
            ",
        )
        .bind(group.as_str())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("ensure group", e))?;

        sqlx::query(
            r"
            INSERT INTO employee_okta_groups (employee_okta_id, group_name)
            VALUES ($1, $2)
            ",
        )
        .bind(member.as_str())
        .bind(group.as_str())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error(&format!("add {member} to {group}"), e))?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn remove_member(&mut self, group: &GroupKey, member: &ProfileId) -> StorageResult<()> {
        let result = sqlx::query(
            r"
            DELETE FROM employee_okta_groups
            WHERE employee_okta_id = $1 AND group_name = $2
            ",
        )
        .bind(member.as_str())
        .bind(group.as_str())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error(&format!("remove {member} from {group}"), e))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found(format!(
                "{member} is not a member of {group}"
            )));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_group(&mut self, group: &GroupKey) -> StorageResult<()> {
        let result = sqlx::query(
            r"
            DELETE FROM okta_groups
            WHERE name = $1
            ",
        )
        .bind(group.as_str())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error(&format!("delete group {group}"), e))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found(format!("group {group}")));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StorageResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))
    }

    async fn rollback(self: Box<Self>) -> StorageResult<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }
}
