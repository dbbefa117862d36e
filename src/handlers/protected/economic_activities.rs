// handlers/protected/economic_activities.rs - /api/v1/core/economic_activities handlers

use axum::extract::{Extension, State};
use serde::Deserialize;
use validator::Validate;

use crate::database::models::{EconomicActivity, EconomicActivityFilter};
use crate::database::TenantId;
use crate::handlers::extract::{ValidatedJson, ValidatedQuery};
use crate::middleware::{ApiResponse, ApiResult, PageResponse, PageResult};
use crate::pagination::{default_page, default_size_page, Pagination};
use crate::services::CreateEconomicActivity;
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct EconomicActivitiesQuery {
    pub cuui_id: Option<String>,
    pub description: Option<String>,
    pub status: Option<bool>,

    #[serde(default = "default_page")]
    #[validate(range(min = 1, message = "page must be greater than zero"))]
    pub page: i64,

    #[serde(default = "default_size_page")]
    #[validate(range(min = 1, max = 1000, message = "size_page must be between 1 and 1000"))]
    pub size_page: i64,
}

impl EconomicActivitiesQuery {
    fn split(self) -> (EconomicActivityFilter, Pagination) {
        (
            EconomicActivityFilter {
                cuui_id: self.cuui_id,
                description: self.description,
                status: self.status,
            },
            Pagination::new(self.page, self.size_page),
        )
    }
}

/// GET /api/v1/core/economic_activities
pub async fn list(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantId>,
    ValidatedQuery(query): ValidatedQuery<EconomicActivitiesQuery>,
) -> PageResult<EconomicActivity> {
    let (filter, pagination) = query.split();
    let page = state
        .economic_activities
        .get_economic_activities(&tenant, &filter, &pagination)
        .await?;
    Ok(PageResponse(page))
}

/// POST /api/v1/core/economic_activities
pub async fn create(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantId>,
    ValidatedJson(input): ValidatedJson<CreateEconomicActivity>,
) -> ApiResult<EconomicActivity> {
    let activity = state.economic_activities.create_economic_activity(&tenant, input).await?;
    Ok(ApiResponse::created(activity))
}
