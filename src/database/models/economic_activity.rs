use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct EconomicActivity {
    pub id: String,
    pub cuui_id: String,
    pub description: String,
    pub status: bool,
    pub created_at: DateTime<Utc>,
}

/// Optional list filters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EconomicActivityFilter {
    pub cuui_id: Option<String>,
    pub description: Option<String>,
    pub status: Option<bool>,
}
