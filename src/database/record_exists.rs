use async_trait::async_trait;
use sqlx::Row;
use std::sync::Arc;

use super::manager::{is_valid_identifier, ConnectionProvider, DatabaseError, TenantId};

/// Existence check by table/column/value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistsCheck<'a> {
    pub table: &'static str,
    pub column: &'static str,
    pub value: &'a str,
    /// Treat soft-deleted rows as missing
    pub exclude_deleted: bool,
}

impl<'a> ExistsCheck<'a> {
    /// Live (not soft-deleted) row with `id = value`
    pub fn active_id(table: &'static str, value: &'a str) -> Self {
        Self {
            table,
            column: "id",
            value,
            exclude_deleted: true,
        }
    }

    pub fn active(table: &'static str, column: &'static str, value: &'a str) -> Self {
        Self {
            table,
            column,
            value,
            exclude_deleted: true,
        }
    }

    pub fn to_sql(&self) -> Result<String, DatabaseError> {
        for ident in [self.table, self.column] {
            if !is_valid_identifier(ident) {
                return Err(DatabaseError::InvalidIdentifier(ident.to_string()));
            }
        }
        let mut sql = format!(
            "SELECT COUNT(*) AS total FROM {} WHERE {} = ?",
            self.table, self.column
        );
        if self.exclude_deleted {
            sql.push_str(" AND deleted_at IS NULL");
        }
        Ok(sql)
    }
}

#[async_trait]
pub trait RecordExists: Send + Sync {
    async fn record_exists(&self, tenant: &TenantId, check: ExistsCheck<'_>) -> Result<bool, DatabaseError>;
}

pub struct MySqlRecordExists {
    provider: Arc<dyn ConnectionProvider>,
}

impl MySqlRecordExists {
    pub fn new(provider: Arc<dyn ConnectionProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl RecordExists for MySqlRecordExists {
    async fn record_exists(&self, tenant: &TenantId, check: ExistsCheck<'_>) -> Result<bool, DatabaseError> {
        let sql = check.to_sql()?;
        let pool = self.provider.pool(tenant).await?;
        let row = sqlx::query(&sql)
            .bind(check.value)
            .fetch_one(&pool)
            .await
            .map_err(DatabaseError::query("record_exists"))?;
        let total: i64 = row.try_get("total").map_err(DatabaseError::query("record_exists"))?;
        Ok(total > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_check_excludes_deleted_rows() {
        let sql = ExistsCheck::active_id("core_users", "u-1").to_sql().unwrap();
        assert_eq!(
            sql,
            "SELECT COUNT(*) AS total FROM core_users WHERE id = ? AND deleted_at IS NULL"
        );
    }

    #[test]
    fn plain_check_keeps_deleted_rows() {
        let check = ExistsCheck {
            table: "core_users",
            column: "username",
            value: "ana",
            exclude_deleted: false,
        };
        assert_eq!(
            check.to_sql().unwrap(),
            "SELECT COUNT(*) AS total FROM core_users WHERE username = ?"
        );
    }

    #[test]
    fn rejects_unsafe_identifiers() {
        let check = ExistsCheck::active("core_users", "id = 1 OR 1", "x");
        assert!(matches!(check.to_sql(), Err(DatabaseError::InvalidIdentifier(_))));
    }
}
