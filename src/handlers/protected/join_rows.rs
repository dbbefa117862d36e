// handlers/protected/join_rows.rs - list/update/delete handlers shared by
// /roles/:role_id/policies and /policies/:policy_id/permissions

use axum::extract::{Extension, Path, State};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::database::TenantId;
use crate::error::SmartError;
use crate::handlers::extract::{PageQuery, ValidatedJson, ValidatedQuery};
use crate::middleware::{ApiResponse, ApiResult, PageResponse, PageResult};
use crate::services::{JoinRowKind, JoinRowService, PolicyPermissions, RolePolicies};
use crate::state::AppState;

/// Resolves the join-row service of kind `K` from the shared state
pub trait HasJoinRows<K: JoinRowKind> {
    fn join_rows(&self) -> &JoinRowService<K>;
}

impl HasJoinRows<RolePolicies> for AppState {
    fn join_rows(&self) -> &JoinRowService<RolePolicies> {
        &self.role_policies
    }
}

impl HasJoinRows<PolicyPermissions> for AppState {
    fn join_rows(&self) -> &JoinRowService<PolicyPermissions> {
        &self.policy_permissions
    }
}

pub(crate) fn enabled() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateEnable {
    pub enable: bool,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DeleteBatch {
    #[validate(length(min = 1, max = 500, message = "ids must contain between 1 and 500 items"))]
    pub ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnableState {
    pub id: String,
    pub enable: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Deleted {
    pub ids: Vec<String>,
}

/// GET .../:parent_id/<children>
pub async fn list<K>(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantId>,
    Path(parent_id): Path<String>,
    ValidatedQuery(query): ValidatedQuery<PageQuery>,
) -> PageResult<K::Row>
where
    K: JoinRowKind,
    AppState: HasJoinRows<K>,
    SmartError: From<K::Error>,
{
    let page = state.join_rows().list(&tenant, &parent_id, &query.pagination()).await?;
    Ok(PageResponse(page))
}

/// PUT .../:parent_id/<children>/:id
pub async fn update<K>(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantId>,
    Path((parent_id, id)): Path<(String, String)>,
    ValidatedJson(input): ValidatedJson<UpdateEnable>,
) -> ApiResult<EnableState>
where
    K: JoinRowKind,
    AppState: HasJoinRows<K>,
    SmartError: From<K::Error>,
{
    state.join_rows().update(&tenant, &parent_id, &id, input.enable).await?;
    Ok(ApiResponse::success(EnableState { id, enable: input.enable }))
}

/// DELETE .../:parent_id/<children>/:id
pub async fn delete<K>(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantId>,
    Path((parent_id, id)): Path<(String, String)>,
) -> ApiResult<Deleted>
where
    K: JoinRowKind,
    AppState: HasJoinRows<K>,
    SmartError: From<K::Error>,
{
    state.join_rows().delete(&tenant, &parent_id, &id).await?;
    Ok(ApiResponse::success(Deleted { ids: vec![id] }))
}

/// DELETE .../:parent_id/<children>/batch
pub async fn delete_batch<K>(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantId>,
    Path(parent_id): Path<String>,
    ValidatedJson(input): ValidatedJson<DeleteBatch>,
) -> ApiResult<Deleted>
where
    K: JoinRowKind,
    AppState: HasJoinRows<K>,
    SmartError: From<K::Error>,
{
    state.join_rows().delete_batch(&tenant, &parent_id, &input.ids).await?;
    Ok(ApiResponse::success(Deleted { ids: input.ids }))
}
