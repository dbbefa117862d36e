use async_trait::async_trait;
use sqlx::Row;
use std::sync::Arc;

use crate::database::manager::{ConnectionProvider, DatabaseError, TenantId};
use crate::database::models::{EconomicActivity, EconomicActivityFilter};
use crate::database::query_builder::{bind_query, bind_query_as, FilterBuilder};
use crate::pagination::Pagination;

const SELECT_ACTIVITIES: &str =
    "SELECT id, cuui_id, description, status, created_at FROM core_economic_activities";
const FROM_ACTIVITIES: &str = "FROM core_economic_activities";

const INSERT_ACTIVITY: &str = r#"
    INSERT INTO core_economic_activities (id, cuui_id, description, status, created_at)
    VALUES (?, ?, ?, ?, ?)
"#;

#[async_trait]
pub trait EconomicActivityRepository: Send + Sync {
    async fn get_economic_activities(
        &self,
        tenant: &TenantId,
        filter: &EconomicActivityFilter,
        pagination: &Pagination,
    ) -> Result<Vec<EconomicActivity>, DatabaseError>;

    async fn get_total_economic_activities(
        &self,
        tenant: &TenantId,
        filter: &EconomicActivityFilter,
    ) -> Result<i64, DatabaseError>;

    async fn create_economic_activity(&self, tenant: &TenantId, activity: &EconomicActivity) -> Result<(), DatabaseError>;
}

/// Conditions shared by the page and the total queries
pub fn activity_filter(filter: &EconomicActivityFilter) -> FilterBuilder {
    FilterBuilder::new()
        .raw("deleted_at IS NULL")
        .eq_opt("cuui_id", filter.cuui_id.as_deref())
        .contains_opt("description", filter.description.as_deref())
        .eq_opt("status", filter.status)
}

pub struct MySqlEconomicActivityRepository {
    provider: Arc<dyn ConnectionProvider>,
}

impl MySqlEconomicActivityRepository {
    pub fn new(provider: Arc<dyn ConnectionProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl EconomicActivityRepository for MySqlEconomicActivityRepository {
    async fn get_economic_activities(
        &self,
        tenant: &TenantId,
        filter: &EconomicActivityFilter,
        pagination: &Pagination,
    ) -> Result<Vec<EconomicActivity>, DatabaseError> {
        let pool = self.provider.pool(tenant).await?;
        let builder = activity_filter(filter);
        let sql = builder.select_sql(SELECT_ACTIVITIES, "created_at DESC");
        let args = builder.page_args(pagination);

        bind_query_as(sqlx::query_as::<_, EconomicActivity>(&sql), &args)
            .fetch_all(&pool)
            .await
            .map_err(DatabaseError::query("get_economic_activities"))
    }

    async fn get_total_economic_activities(
        &self,
        tenant: &TenantId,
        filter: &EconomicActivityFilter,
    ) -> Result<i64, DatabaseError> {
        let pool = self.provider.pool(tenant).await?;
        let builder = activity_filter(filter);
        let sql = builder.count_sql(FROM_ACTIVITIES);

        let row = bind_query(sqlx::query(&sql), builder.args())
            .fetch_one(&pool)
            .await
            .map_err(DatabaseError::query("get_total_economic_activities"))?;
        row.try_get("total")
            .map_err(DatabaseError::query("get_total_economic_activities"))
    }

    async fn create_economic_activity(&self, tenant: &TenantId, activity: &EconomicActivity) -> Result<(), DatabaseError> {
        let pool = self.provider.pool(tenant).await?;
        sqlx::query(INSERT_ACTIVITY)
            .bind(&activity.id)
            .bind(&activity.cuui_id)
            .bind(&activity.description)
            .bind(activity.status)
            .bind(activity.created_at)
            .execute(&pool)
            .await
            .map_err(DatabaseError::query("create_economic_activity"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::query_builder::SqlValue;

    #[test]
    fn page_and_total_bind_the_same_filters() {
        let filter = EconomicActivityFilter {
            cuui_id: Some("0111".into()),
            description: Some("cultivo".into()),
            status: Some(true),
        };
        let builder = activity_filter(&filter);
        let page_args = builder.page_args(&Pagination::new(1, 100));

        assert_eq!(
            builder.args(),
            [
                SqlValue::Text("0111".into()),
                SqlValue::Text("%cultivo%".into()),
                SqlValue::Bool(true)
            ]
        );
        assert_eq!(&page_args[..3], builder.args());
        assert!(builder
            .count_sql(FROM_ACTIVITIES)
            .ends_with("WHERE deleted_at IS NULL AND cuui_id = ? AND description LIKE ? AND status = ?"));
    }
}
