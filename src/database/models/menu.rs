use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::mysql::MySqlRow;
use sqlx::{FromRow, Row};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewMenuUser {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub url: String,
    pub icon: Option<String>,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

/// Module with the views the user can reach, as stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleMenuUser {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    /// Dot-delimited hierarchy key, e.g. `logistic.requirements`
    pub code: String,
    pub icon: Option<String>,
    pub position: i32,
    pub created_at: DateTime<Utc>,
    pub views: Vec<ViewMenuUser>,
}

/// Menu node built at read time. Parents synthesised from a code prefix have
/// no id or creation date until the real module row shows up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuModule {
    pub id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub code: String,
    pub icon: Option<String>,
    pub position: i32,
    pub created_at: Option<DateTime<Utc>>,
    pub views: Vec<ViewMenuUser>,
    pub modules: Vec<MenuModule>,
}

impl From<ModuleMenuUser> for MenuModule {
    fn from(m: ModuleMenuUser) -> Self {
        Self {
            id: Some(m.id),
            name: m.name,
            description: m.description,
            code: m.code,
            icon: m.icon,
            position: m.position,
            created_at: Some(m.created_at),
            views: m.views,
            modules: Vec::new(),
        }
    }
}

/// One module/view pair; the view side is empty for modules without views
#[derive(Debug, Clone, PartialEq)]
pub struct MenuRow {
    pub module: ModuleMenuUser,
    pub view: Option<ViewMenuUser>,
}

impl<'r> FromRow<'r, MySqlRow> for MenuRow {
    fn from_row(row: &'r MySqlRow) -> Result<Self, sqlx::Error> {
        let module = ModuleMenuUser {
            id: row.try_get("module_id")?,
            name: row.try_get("module_name")?,
            description: row.try_get("module_description")?,
            code: row.try_get("module_code")?,
            icon: row.try_get("module_icon")?,
            position: row.try_get("module_position")?,
            created_at: row.try_get("module_created_at")?,
            views: Vec::new(),
        };

        let view_id: Option<String> = row.try_get("view_id")?;
        let view = match view_id {
            Some(id) => Some(ViewMenuUser {
                id,
                name: row.try_get("view_name")?,
                description: row.try_get("view_description")?,
                url: row.try_get("view_url")?,
                icon: row.try_get("view_icon")?,
                position: row.try_get("view_position")?,
                created_at: row.try_get("view_created_at")?,
            }),
            None => None,
        };

        Ok(Self { module, view })
    }
}
