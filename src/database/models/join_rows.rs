use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::mysql::MySqlRow;
use sqlx::{FromRow, Row};

/// Permission attached to a policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Permission {
    pub id: String,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Join row between a policy and a permission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyPermission {
    pub id: String,
    pub enable: bool,
    pub created_at: DateTime<Utc>,
    pub permission: Permission,
}

// Columns are flattened by prefix: policy_permission_* for the join row,
// permission_* for the nested permission.
impl<'r> FromRow<'r, MySqlRow> for PolicyPermission {
    fn from_row(row: &'r MySqlRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("policy_permission_id")?,
            enable: row.try_get("policy_permission_enable")?,
            created_at: row.try_get("policy_permission_created_at")?,
            permission: Permission {
                id: row.try_get("permission_id")?,
                code: row.try_get("permission_code")?,
                name: row.try_get("permission_name")?,
                description: row.try_get("permission_description")?,
                created_at: row.try_get("permission_created_at")?,
            },
        })
    }
}

/// Policy attached to a role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyByRolePolicy {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub level: i32,
    pub enable: bool,
    pub created_at: DateTime<Utc>,
}

/// Join row between a role and a policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RolePolicy {
    pub id: String,
    pub enable: bool,
    pub created_at: DateTime<Utc>,
    pub policy: PolicyByRolePolicy,
}

impl<'r> FromRow<'r, MySqlRow> for RolePolicy {
    fn from_row(row: &'r MySqlRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("role_policy_id")?,
            enable: row.try_get("role_policy_enable")?,
            created_at: row.try_get("role_policy_created_at")?,
            policy: PolicyByRolePolicy {
                id: row.try_get("policy_id")?,
                name: row.try_get("policy_name")?,
                description: row.try_get("policy_description")?,
                level: row.try_get("policy_level")?,
                enable: row.try_get("policy_enable")?,
                created_at: row.try_get("policy_created_at")?,
            },
        })
    }
}

/// Values written when a join row is inserted
#[derive(Debug, Clone, PartialEq)]
pub struct NewJoinRow {
    pub id: String,
    pub parent_id: String,
    pub child_id: String,
    pub enable: bool,
    pub created_at: DateTime<Utc>,
}
