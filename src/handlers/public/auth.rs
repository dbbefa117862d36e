// handlers/public/auth.rs - POST /api/v1/auth/login handler

use axum::extract::{Extension, State};

use crate::database::TenantId;
use crate::handlers::extract::ValidatedJson;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::{LoginRequest, LoginResponse};
use crate::state::AppState;

pub async fn login(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantId>,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> ApiResult<LoginResponse> {
    let response = state.auth.login(&tenant, request).await?;
    Ok(ApiResponse::success(response))
}
