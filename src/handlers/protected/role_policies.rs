// handlers/protected/role_policies.rs - POST /api/v1/core/roles/:role_id/policies[/batch]

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
pub struct RolePolicyCreated {
    pub id: String,
    pub role_id: String,
    pub policy_id: String,
    pub enable: bool,
    pub created_at: DateTime<Utc>,
}

impl From<NewJoinRow> for RolePolicyCreated {
    fn from(row: NewJoinRow) -> Self {
        Self {
            id: row.id,
            role_id: row.parent_id,
            policy_id: row.child_id,
            enable: row.enable,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateRolePolicy {
    #[validate(length(min = 1, message = "policy_id is required"))]
    pub policy_id: String,

    #[serde(default = "enabled")]
    pub enable: bool,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateRolePolicies {
    #[validate(length(min = 1, max = 500, message = "policy_ids must contain between 1 and 500 items"))]
    pub policy_ids: Vec<String>,

    #[serde(default = "enabled")]
    pub enable: bool,
}

pub async fn create(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantId>,
    Path(role_id): Path<String>,
    ValidatedJson(input): ValidatedJson<CreateRolePolicy>,
) -> ApiResult<RolePolicyCreated> {
    let row = state
        .role_policies
        .create(&tenant, &role_id, &input.policy_id, input.enable)
        .await?;
    Ok(ApiResponse::created(row.into()))
}

pub async fn create_batch(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantId>,
    Path(role_id): Path<String>,
    ValidatedJson(input): ValidatedJson<CreateRolePolicies>,
) -> ApiResult<Vec<RolePolicyCreated>> {
    let rows = state
        .role_policies
        .create_batch(&tenant, &role_id, &input.policy_ids, input.enable)
        .await?;
    Ok(ApiResponse::created(rows.into_iter().map(Into::into).collect()))
}
