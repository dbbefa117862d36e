// handlers/protected/users.rs - /api/v1/core/users handlers

use axum::extract::{Extension, Path, State};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::database::models::{MenuModule, UserFilter, UserMe, UserMultiple};
use crate::database::TenantId;
use crate::handlers::extract::{ValidatedJson, ValidatedQuery};
use crate::middleware::{ApiResponse, ApiResult, AuthUser, PageResponse, PageResult};
use crate::pagination::{default_page, default_size_page, Pagination};
use crate::services::{ChangePassword, CreateUser, UpdateUser};
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UsersQuery {
    pub username: Option<String>,
    pub user_type_id: Option<String>,

    #[serde(default = "default_page")]
    #[validate(range(min = 1, message = "page must be greater than zero"))]
    pub page: i64,

    #[serde(default = "default_size_page")]
    #[validate(range(min = 1, max = 1000, message = "size_page must be between 1 and 1000"))]
    pub size_page: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserId {
    pub id: String,
}

/// GET /api/v1/core/users
pub async fn list(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantId>,
    ValidatedQuery(query): ValidatedQuery<UsersQuery>,
) -> PageResult<UserMultiple> {
    let pagination = Pagination::new(query.page, query.size_page);
    let filter = UserFilter {
        username: query.username,
        user_type_id: query.user_type_id,
    };
    let page = state.users.get_users(&tenant, &filter, &pagination).await?;
    Ok(PageResponse(page))
}

/// POST /api/v1/core/users
pub async fn create(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantId>,
    ValidatedJson(input): ValidatedJson<CreateUser>,
) -> ApiResult<UserMultiple> {
    let user = state.users.create_user(&tenant, input).await?;
    Ok(ApiResponse::created(user))
}

/// GET /api/v1/core/users/me
pub async fn me(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantId>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<UserMe> {
    let me = state.users.get_me(&tenant, &user.user_id).await?;
    Ok(ApiResponse::success(me))
}

/// GET /api/v1/core/users/menu
pub async fn menu(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantId>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Vec<MenuModule>> {
    let menu = state.users.get_menu(&tenant, &user.user_id).await?;
    Ok(ApiResponse::success(menu))
}

/// GET /api/v1/core/users/:id
pub async fn show(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantId>,
    Path(id): Path<String>,
) -> ApiResult<UserMultiple> {
    let user = state.users.get_user(&tenant, &id).await?;
    Ok(ApiResponse::success(user))
}

/// PUT /api/v1/core/users/:id
pub async fn update(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantId>,
    Path(id): Path<String>,
    ValidatedJson(input): ValidatedJson<UpdateUser>,
) -> ApiResult<UserMultiple> {
    let user = state.users.update_user(&tenant, &id, input).await?;
    Ok(ApiResponse::success(user))
}

/// DELETE /api/v1/core/users/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantId>,
    Path(id): Path<String>,
) -> ApiResult<UserId> {
    state.users.delete_user(&tenant, &id).await?;
    Ok(ApiResponse::success(UserId { id }))
}

/// PUT /api/v1/core/users/:id/password
pub async fn change_password(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantId>,
    Path(id): Path<String>,
    ValidatedJson(input): ValidatedJson<ChangePassword>,
) -> ApiResult<UserId> {
    state.users.change_password(&tenant, &id, input).await?;
    Ok(ApiResponse::success(UserId { id }))
}
