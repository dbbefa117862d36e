use axum::http::StatusCode;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::error::Elapsed;
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

use super::{bounded, fetch_page, Clock};
use crate::database::models::{EconomicActivity, EconomicActivityFilter};
use crate::database::repositories::EconomicActivityRepository;
use crate::database::{DatabaseError, ExistsCheck, RecordExists, TenantId};
use crate::error::{ErrorLayer, SmartError};
use crate::pagination::{Page, Pagination};

const TABLE: &str = "core_economic_activities";

#[derive(Debug, Error)]
pub enum EconomicActivityError {
    #[error("economic activity with cuui_id {0} already exists")]
    AlreadyExist(String),

    #[error("economic activities use case timed out")]
    Timeout(#[from] Elapsed),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<EconomicActivityError> for SmartError {
    fn from(err: EconomicActivityError) -> Self {
        match err {
            EconomicActivityError::AlreadyExist(cuui_id) => SmartError::new(
                "ERR_ECONOMIC_ACTIVITY_ALREADY_EXIST",
                "An economic activity with this cuui_id already exists",
                StatusCode::CONFLICT,
                ErrorLayer::Domain,
            )
            .with_raw(cuui_id),
            EconomicActivityError::Timeout(_) => SmartError::timeout("economic_activities"),
            EconomicActivityError::Database(e) => e.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateEconomicActivity {
    #[validate(length(min = 1, max = 20, message = "cuui_id is required"))]
    pub cuui_id: String,

    #[validate(length(min = 1, max = 255, message = "description is required"))]
    pub description: String,

    #[serde(default = "enabled")]
    pub status: bool,
}

fn enabled() -> bool {
    true
}

pub struct EconomicActivityService {
    repo: Arc<dyn EconomicActivityRepository>,
    exists: Arc<dyn RecordExists>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl EconomicActivityService {
    pub fn new(
        repo: Arc<dyn EconomicActivityRepository>,
        exists: Arc<dyn RecordExists>,
        clock: Arc<dyn Clock>,
        timeout: Duration,
    ) -> Self {
        Self {
            repo,
            exists,
            clock,
            timeout,
        }
    }

    pub async fn get_economic_activities(
        &self,
        tenant: &TenantId,
        filter: &EconomicActivityFilter,
        pagination: &Pagination,
    ) -> Result<Page<EconomicActivity>, EconomicActivityError> {
        debug!(%tenant, ?filter, "Listing economic activities");
        bounded(self.timeout, async {
            fetch_page(
                pagination,
                self.repo.get_economic_activities(tenant, filter, pagination),
                self.repo.get_total_economic_activities(tenant, filter),
            )
            .await
            .map_err(EconomicActivityError::from)
        })
        .await
    }

    pub async fn create_economic_activity(
        &self,
        tenant: &TenantId,
        input: CreateEconomicActivity,
    ) -> Result<EconomicActivity, EconomicActivityError> {
        bounded(self.timeout, async {
            let taken = self
                .exists
                .record_exists(tenant, ExistsCheck::active(TABLE, "cuui_id", &input.cuui_id))
                .await?;
            if taken {
                return Err(EconomicActivityError::AlreadyExist(input.cuui_id));
            }

            let activity = EconomicActivity {
                id: Uuid::new_v4().to_string(),
                cuui_id: input.cuui_id,
                description: input.description,
                status: input.status,
                created_at: self.clock.now(),
            };
            self.repo.create_economic_activity(tenant, &activity).await?;

            info!(%tenant, id = %activity.id, cuui_id = %activity.cuui_id, "Created economic activity");
            Ok(activity)
        })
        .await
    }
}
