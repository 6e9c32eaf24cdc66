//! `PostgreSQL` directory of employees and groups.

use async_trait::async_trait;
use tracing::{debug, instrument};

use rolebridge_core::{
    DirectoryStore, Employee, GroupKey, GroupRecord, Page, ProfileId, StorageError, StorageResult,
};

use crate::error::map_sqlx_error;
use crate::store::PgMembershipStore;

#[derive(Debug, sqlx::FromRow)]
struct EmployeeRow {
    okta_id: String,
    name: String,
    email: String,
    active: bool,
}

impl From<EmployeeRow> for Employee {
    fn from(row: EmployeeRow) -> Self {
        Self {
            id: ProfileId::new(row.okta_id),
            name: row.name,
            email: row.email,
            active: row.active,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct GroupRow {
    name: String,
    okta_id: Option<String>,
}

impl From<GroupRow> for GroupRecord {
    fn from(row: GroupRow) -> Self {
        Self {
            name: GroupKey::new(row.name),
            external_id: row.okta_id,
        }
    }
}

#[async_trait]
impl DirectoryStore for PgMembershipStore {
    #[instrument(skip(self, employee), fields(okta_id = %employee.id))]
    async fn upsert_employee(&self, employee: &Employee) -> StorageResult<Employee> {
        let row: EmployeeRow = sqlx::query_as(
            r"
            INSERT INTO employees (okta_id, name, email, active)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (okta_id) DO UPDATE
            SET name = EXCLUDED.name, email = EXCLUDED.email, active = EXCLUDED.active
            RETURNING okta_id, name, email, active
            ",
        )
        .bind(employee.id.as_str())
        .bind(&employee.name)
        .bind(&employee.email)
        .bind(employee.active)
        .fetch_one(self.pool())
        .await
        .map_err(|e| map_sqlx_error("upsert employee", e))?;
        Ok(row.into())
    }

    async fn get_employee(&self, id: &ProfileId) -> StorageResult<Option<Employee>> {
        let row: Option<EmployeeRow> = sqlx::query_as(
            r"
            SELECT okta_id, name, email, active
            FROM employees
            WHERE okta_id = $1
            ",
        )
        .bind(id.as_str())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| map_sqlx_error("get employee", e))?;
        Ok(row.map(Employee::from))
    }

    async fn find_employee_by_email(&self, email: &str) -> StorageResult<Option<Employee>> {
        let row: Option<EmployeeRow> = sqlx::query_as(
            r"
            SELECT okta_id, name, email, active
            FROM employees
            WHERE email = $1
            ORDER BY okta_id
            LIMIT 1
            ",
        )
        .bind(email)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| map_sqlx_error("find employee by email", e))?;
        Ok(row.map(Employee::from))
    }

    async fn list_employees(&self, page: Page) -> StorageResult<Vec<Employee>> {
        let rows: Vec<EmployeeRow> = sqlx::query_as(
            r"
            SELECT okta_id, name, email, active
            FROM employees
            ORDER BY okta_id
            LIMIT $1 OFFSET $2
            ",
        )
        .bind(i64::from(page.limit))
        .bind(i64::from(page.offset))
        .fetch_all(self.pool())
        .await
        .map_err(|e| map_sqlx_error("list employees", e))?;

        debug!(count = rows.len(), "Listed employees");
        Ok(rows.into_iter().map(Employee::from).collect())
    }

    #[instrument(skip(self))]
    async fn deactivate_employee(&self, id: &ProfileId) -> StorageResult<()> {
        let result = sqlx::query(
            r"
            UPDATE employees
            SET active = FALSE
            WHERE okta_id = $1
            ",
        )
        .bind(id.as_str())
        .execute(self.pool())
        .await
        .map_err(|e| map_sqlx_error("deactivate employee", e))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found(format!("employee {id}")));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn create_group(&self, group: &GroupKey, external_id: &str) -> StorageResult<GroupRecord> {
        let row: GroupRow = sqlx::query_as(
            r"
            INSERT INTO okta_groups (name, okta_id)
            VALUES ($1, $2)
            RETURNING name, okta_id
            ",
        )
        .bind(group.as_str())
        .bind(external_id)
        .fetch_one(self.pool())
        .await
        .map_err(|e| map_sqlx_error(&format!("create group {group}"), e))?;
        Ok(row.into())
    }

    /// Moves `external_id` away from any other group in the same transaction.
    #[instrument(skip(self))]
    async fn bind_group(&self, group: &GroupKey, external_id: &str) -> StorageResult<GroupRecord> {
        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin transaction", e))?;

        sqlx::query(
            r"
            UPDATE okta_groups
            SET okta_id = NULL
            WHERE okta_id = $1 AND name <> $2
            ",
        )
        .bind(external_id)
        .bind(group.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("release group id", e))?;

        let row: GroupRow = sqlx::query_as(
            r"
            INSERT INTO okta_groups (name, okta_id)
            VALUES ($1, $2)
            ON CONFLICT (name) DO UPDATE
            SET okta_id = EXCLUDED.okta_id
            RETURNING name, okta_id
            ",
        )
        .bind(group.as_str())
        .bind(external_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error(&format!("bind group {group}"), e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))?;
        Ok(row.into())
    }

    async fn find_group(&self, external_id: &str) -> StorageResult<Option<GroupRecord>> {
        let row: Option<GroupRow> = sqlx::query_as(
            r"
            SELECT name, okta_id
            FROM okta_groups
            WHERE okta_id = $1
            ",
        )
        .bind(external_id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| map_sqlx_error("find group", e))?;
        Ok(row.map(GroupRecord::from))
    }

    async fn find_group_by_name(&self, group: &GroupKey) -> StorageResult<Option<GroupRecord>> {
        let row: Option<GroupRow> = sqlx::query_as(
            r"
            SELECT name, okta_id
            FROM okta_groups
            WHERE name = $1
            ",
        )
        .bind(group.as_str())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| map_sqlx_error("find group by name", e))?;
        Ok(row.map(GroupRecord::from))
    }

    async fn list_groups(&self, page: Page) -> StorageResult<Vec<GroupRecord>> {
        let rows: Vec<GroupRow> = sqlx::query_as(
            r"
            SELECT name, okta_id
            FROM okta_groups
            ORDER BY name
            LIMIT $1 OFFSET $2
            ",
        )
        .bind(i64::from(page.limit))
        .bind(i64::from(page.offset))
        .fetch_all(self.pool())
        .await
        .map_err(|e| map_sqlx_error("list groups", e))?;
        Ok(rows.into_iter().map(GroupRecord::from).collect())
    }
}
