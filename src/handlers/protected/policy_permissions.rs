// handlers/protected/policy_permissions.rs - POST /api/v1/core/policies/:policy_id/permissions[/batch]

use axum::extract::{Extension, Path, State};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::join_rows::enabled;
use crate::database::models::NewJoinRow;
use crate::database::TenantId;
use crate::handlers::extract::ValidatedJson;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

/// Join row as returned by the create endpoints
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicyPermissionCreated {
    pub id: String,
    pub policy_id: String,
    pub permission_id: String,
    pub enable: bool,
    pub created_at: DateTime<Utc>,
}

impl From<NewJoinRow> for PolicyPermissionCreated {
    fn from(row: NewJoinRow) -> Self {
        Self {
            id: row.id,
            policy_id: row.parent_id,
            permission_id: row.child_id,
            enable: row.enable,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePolicyPermission {
    #[validate(length(min = 1, message = "permission_id is required"))]
    pub permission_id: String,

    #[serde(default = "enabled")]
    pub enable: bool,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePolicyPermissions {
    #[validate(length(min = 1, max = 500, message = "permission_ids must contain between 1 and 500 items"))]
    pub permission_ids: Vec<String>,

    #[serde(default = "enabled")]
    pub enable: bool,
}

pub async fn create(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantId>,
    Path(policy_id): Path<String>,
    ValidatedJson(input): ValidatedJson<CreatePolicyPermission>,
) -> ApiResult<PolicyPermissionCreated> {
    let row = state
        .policy_permissions
        .create(&tenant, &policy_id, &input.permission_id, input.enable)
        .await?;
    Ok(ApiResponse::created(row.into()))
}

pub async fn create_batch(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantId>,
    Path(policy_id): Path<String>,
    ValidatedJson(input): ValidatedJson<CreatePolicyPermissions>,
) -> ApiResult<Vec<PolicyPermissionCreated>> {
    let rows = state
        .policy_permissions
        .create_batch(&tenant, &policy_id, &input.permission_ids, input.enable)
        .await?;
    Ok(ApiResponse::created(rows.into_iter().map(Into::into).collect()))
}
