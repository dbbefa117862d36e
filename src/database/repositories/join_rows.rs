use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{FromRow, Row};
use std::marker::PhantomData;
use std::sync::Arc;

use crate::database::manager::{is_valid_identifier, ConnectionProvider, DatabaseError, TenantId};
use crate::database::models::NewJoinRow;
use crate::database::transaction::{commit_or_rollback, expect_affected};
use crate::pagination::Pagination;

/// Tables and columns of a many-to-many association.
///
/// `select` must read the join table aliased as `j` and expose the columns
/// the row type's `FromRow` expects.
#[derive(Debug, Clone, Copy)]
pub struct JoinTable {
    pub table: &'static str,
    pub parent_column: &'static str,
    pub child_column: &'static str,
    pub select: &'static str,
}

pub const ROLE_POLICIES: JoinTable = JoinTable {
    table: "core_role_policies",
    parent_column: "role_id",
    child_column: "policy_id",
    select: r#"
        SELECT j.id AS role_policy_id, j.enable AS role_policy_enable, j.created_at AS role_policy_created_at,
               c.id AS policy_id, c.name AS policy_name, c.description AS policy_description,
               c.level AS policy_level, c.enable AS policy_enable, c.created_at AS policy_created_at
        FROM core_role_policies j
        INNER JOIN core_policies c ON c.id = j.policy_id AND c.deleted_at IS NULL
    "#,
};

pub const POLICY_PERMISSIONS: JoinTable = JoinTable {
    table: "core_policy_permissions",
    parent_column: "policy_id",
    child_column: "permission_id",
    select: r#"
        SELECT j.id AS policy_permission_id, j.enable AS policy_permission_enable,
               j.created_at AS policy_permission_created_at,
               c.id AS permission_id, c.code AS permission_code, c.name AS permission_name,
               c.description AS permission_description, c.created_at AS permission_created_at
        FROM core_policy_permissions j
        INNER JOIN core_permissions c ON c.id = j.permission_id AND c.deleted_at IS NULL
    "#,
};

/// Statements rendered once per join table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinSql {
    pub list: String,
    pub total: String,
    pub has: String,
    pub insert: String,
    pub update_enable: String,
    pub soft_delete: String,
}

impl JoinSql {
    pub fn new(t: &JoinTable) -> Result<Self, DatabaseError> {
        for ident in [t.table, t.parent_column, t.child_column] {
            if !is_valid_identifier(ident) {
                return Err(DatabaseError::InvalidIdentifier(ident.to_string()));
            }
        }
        let (table, parent, child) = (t.table, t.parent_column, t.child_column);
        let scope = format!("WHERE j.{parent} = ? AND j.deleted_at IS NULL");

        Ok(Self {
            list: format!(
                "{} {scope} ORDER BY j.created_at DESC LIMIT ? OFFSET ?",
                t.select.trim()
            ),
            total: format!("SELECT COUNT(*) AS total FROM {table} j {scope}"),
            has: format!(
                "SELECT COUNT(*) AS total FROM {table} WHERE {parent} = ? AND {child} = ? AND deleted_at IS NULL"
            ),
            insert: format!(
                "INSERT INTO {table} (id, {parent}, {child}, enable, created_at) VALUES (?, ?, ?, ?, ?)"
            ),
            update_enable: format!(
                "UPDATE {table} SET enable = ?, updated_at = ? WHERE id = ? AND {parent} = ? AND deleted_at IS NULL"
            ),
            soft_delete: format!(
                "UPDATE {table} SET deleted_at = ? WHERE id = ? AND {parent} = ? AND deleted_at IS NULL"
            ),
        })
    }
}

/// Storage of join rows of type `R` scoped by their parent id
#[async_trait]
pub trait JoinRowRepository<R>: Send + Sync {
    async fn list(&self, tenant: &TenantId, parent_id: &str, pagination: &Pagination) -> Result<Vec<R>, DatabaseError>;

    async fn total(&self, tenant: &TenantId, parent_id: &str) -> Result<i64, DatabaseError>;

    /// True when a live row already links `parent_id` to `child_id`
    async fn has(&self, tenant: &TenantId, parent_id: &str, child_id: &str) -> Result<bool, DatabaseError>;

    async fn create(&self, tenant: &TenantId, row: &NewJoinRow) -> Result<(), DatabaseError>;

    /// All rows or none
    async fn create_batch(&self, tenant: &TenantId, rows: &[NewJoinRow]) -> Result<(), DatabaseError>;

    async fn update_enable(
        &self,
        tenant: &TenantId,
        parent_id: &str,
        id: &str,
        enable: bool,
        at: DateTime<Utc>,
    ) -> Result<(), DatabaseError>;

    async fn delete(&self, tenant: &TenantId, parent_id: &str, id: &str, at: DateTime<Utc>) -> Result<(), DatabaseError>;

    /// All rows or none
    async fn delete_batch(
        &self,
        tenant: &TenantId,
        parent_id: &str,
        ids: &[String],
        at: DateTime<Utc>,
    ) -> Result<(), DatabaseError>;
}

pub struct MySqlJoinRowRepository<R> {
    provider: Arc<dyn ConnectionProvider>,
    sql: JoinSql,
    _phantom: PhantomData<fn() -> R>,
}

impl<R> MySqlJoinRowRepository<R> {
    pub fn new(provider: Arc<dyn ConnectionProvider>, table: JoinTable) -> Result<Self, DatabaseError> {
        Ok(Self {
            provider,
            sql: JoinSql::new(&table)?,
            _phantom: PhantomData,
        })
    }
}

#[async_trait]
impl<R> JoinRowRepository<R> for MySqlJoinRowRepository<R>
where
    R: for<'r> FromRow<'r, MySqlRow> + Send + Unpin + 'static,
{
    async fn list(&self, tenant: &TenantId, parent_id: &str, pagination: &Pagination) -> Result<Vec<R>, DatabaseError> {
        let pool = self.provider.pool(tenant).await?;
        sqlx::query_as::<_, R>(&self.sql.list)
            .bind(parent_id)
            .bind(pagination.limit())
            .bind(pagination.offset())
            .fetch_all(&pool)
            .await
            .map_err(DatabaseError::query("join_rows.list"))
    }

    async fn total(&self, tenant: &TenantId, parent_id: &str) -> Result<i64, DatabaseError> {
        let pool = self.provider.pool(tenant).await?;
        let row = sqlx::query(&self.sql.total)
            .bind(parent_id)
            .fetch_one(&pool)
            .await
            .map_err(DatabaseError::query("join_rows.total"))?;
        row.try_get("total").map_err(DatabaseError::query("join_rows.total"))
    }

    async fn has(&self, tenant: &TenantId, parent_id: &str, child_id: &str) -> Result<bool, DatabaseError> {
        let pool = self.provider.pool(tenant).await?;
        let row = sqlx::query(&self.sql.has)
            .bind(parent_id)
            .bind(child_id)
            .fetch_one(&pool)
            .await
            .map_err(DatabaseError::query("join_rows.has"))?;
        let total: i64 = row.try_get("total").map_err(DatabaseError::query("join_rows.has"))?;
        Ok(total > 0)
    }

    async fn create(&self, tenant: &TenantId, row: &NewJoinRow) -> Result<(), DatabaseError> {
        let pool = self.provider.pool(tenant).await?;
        sqlx::query(&self.sql.insert)
            .bind(&row.id)
            .bind(&row.parent_id)
            .bind(&row.child_id)
            .bind(row.enable)
            .bind(row.created_at)
            .execute(&pool)
            .await
            .map_err(DatabaseError::query("join_rows.create"))?;
        Ok(())
    }

    async fn create_batch(&self, tenant: &TenantId, rows: &[NewJoinRow]) -> Result<(), DatabaseError> {
        let pool = self.provider.pool(tenant).await?;
        let mut tx = pool.begin().await.map_err(DatabaseError::query("join_rows.create_batch"))?;

        let result = async {
            for row in rows {
                sqlx::query(&self.sql.insert)
                    .bind(&row.id)
                    .bind(&row.parent_id)
                    .bind(&row.child_id)
                    .bind(row.enable)
                    .bind(row.created_at)
                    .execute(&mut *tx)
                    .await
                    .map_err(DatabaseError::query("join_rows.create_batch"))?;
            }
            Ok::<(), DatabaseError>(())
        }
        .await;

        commit_or_rollback(tx, result, "join_rows.create_batch").await
    }

    async fn update_enable(
        &self,
        tenant: &TenantId,
        parent_id: &str,
        id: &str,
        enable: bool,
        at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let pool = self.provider.pool(tenant).await?;
        let result = sqlx::query(&self.sql.update_enable)
            .bind(enable)
            .bind(at)
            .bind(id)
            .bind(parent_id)
            .execute(&pool)
            .await
            .map_err(DatabaseError::query("join_rows.update_enable"))?;
        expect_affected(result.rows_affected(), "join_rows.update_enable")
    }

    async fn delete(&self, tenant: &TenantId, parent_id: &str, id: &str, at: DateTime<Utc>) -> Result<(), DatabaseError> {
        let pool = self.provider.pool(tenant).await?;
        let result = sqlx::query(&self.sql.soft_delete)
            .bind(at)
            .bind(id)
            .bind(parent_id)
            .execute(&pool)
            .await
            .map_err(DatabaseError::query("join_rows.delete"))?;
        expect_affected(result.rows_affected(), "join_rows.delete")
    }

    async fn delete_batch(
        &self,
        tenant: &TenantId,
        parent_id: &str,
        ids: &[String],
        at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let pool = self.provider.pool(tenant).await?;
        let mut tx = pool.begin().await.map_err(DatabaseError::query("join_rows.delete_batch"))?;

        let result = async {
            for id in ids {
                let done = sqlx::query(&self.sql.soft_delete)
                    .bind(at)
                    .bind(id)
                    .bind(parent_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(DatabaseError::query("join_rows.delete_batch"))?;
                if done.rows_affected() == 0 {
                    return Err(DatabaseError::RowMissing {
                        function: "join_rows.delete_batch",
                        id: id.clone(),
                    });
                }
            }
            Ok::<(), DatabaseError>(())
        }
        .await;

        commit_or_rollback(tx, result, "join_rows.delete_batch").await
    }
}
