use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::mysql::MySqlRow;
use sqlx::{FromRow, Row};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserType {
    pub id: String,
    pub description: String,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub user_type: UserType,
}

/// Marker of the core_users_roles row that linked a role to the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRole {
    pub id: Option<String>,
    pub enable: Option<bool>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Role as seen from a user listing; columns come from a LEFT JOIN
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub enable: Option<bool>,
    pub created_at: Option<DateTime<Utc>>,
    pub user_role: UserRole,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserMultiple {
    #[serde(flatten)]
    pub user: User,
    pub roles: Vec<Role>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: String,
    pub type_document_id: String,
    pub document: String,
    pub names: String,
    pub surname: String,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub gender: Option<String>,
    pub enable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleUser {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub enable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct StoreByUser {
    pub id: String,
    pub name: String,
    pub shortname: Option<String>,
    pub merchant_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct MerchantByUser {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub document: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserMe {
    pub id: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub person: Option<Person>,
    pub roles: Vec<RoleUser>,
    pub stores: Vec<StoreByUser>,
    pub merchants: Vec<MerchantByUser>,
}

/// Data needed to check a login
#[derive(Debug, Clone, FromRow)]
pub struct UserCredentials {
    pub id: String,
    pub username: String,
    #[sqlx(rename = "password")]
    pub password_hash: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserFilter {
    pub username: Option<String>,
    pub user_type_id: Option<String>,
}

/// Person fields as written by create/update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonData {
    pub type_document_id: String,
    pub document: String,
    pub names: String,
    pub surname: String,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub gender: Option<String>,
    pub enable: bool,
}

/// What happens to the person row owned by a user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersonWrite {
    /// Leave person_id untouched
    Keep,
    /// Point person_id at an existing person
    Link(String),
    Create { id: String, data: PersonData },
    Update { id: String, data: PersonData },
}

impl PersonWrite {
    /// person_id to store on the user row, if this write sets one
    pub fn person_id(&self) -> Option<&str> {
        match self {
            PersonWrite::Keep => None,
            PersonWrite::Link(id) | PersonWrite::Create { id, .. } | PersonWrite::Update { id, .. } => Some(id.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleLink {
    pub id: String,
    pub role_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub id: String,
    pub username: String,
    pub password_hash: String,
    pub user_type_id: String,
    pub person: PersonWrite,
    pub roles: Vec<RoleLink>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserUpdate {
    pub id: String,
    pub username: String,
    pub user_type_id: String,
    pub person: PersonWrite,
    /// `Some` replaces every role link of the user
    pub roles: Option<Vec<RoleLink>>,
    pub updated_at: DateTime<Utc>,
}

/// One user/role pair from the listing query
#[derive(Debug, Clone, PartialEq)]
pub struct UserRoleRow {
    pub user: User,
    pub role: Option<Role>,
}

impl<'r> FromRow<'r, MySqlRow> for UserRoleRow {
    fn from_row(row: &'r MySqlRow) -> Result<Self, sqlx::Error> {
        let user = User {
            id: row.try_get("user_id")?,
            username: row.try_get("user_username")?,
            created_at: row.try_get("user_created_at")?,
            user_type: UserType {
                id: row.try_get("user_type_id")?,
                description: row.try_get("user_type_description")?,
                code: row.try_get("user_type_code")?,
            },
        };

        let role_id: Option<String> = row.try_get("role_id")?;
        let role = match role_id {
            Some(id) => Some(Role {
                id: Some(id),
                name: row.try_get("role_name")?,
                description: row.try_get("role_description")?,
                enable: row.try_get("role_enable")?,
                created_at: row.try_get("role_created_at")?,
                user_role: UserRole {
                    id: row.try_get("user_role_id")?,
                    enable: row.try_get("user_role_enable")?,
                    created_at: row.try_get("user_role_created_at")?,
                },
            }),
            None => None,
        };

        Ok(Self { user, role })
    }
}

/// Collapses user/role rows into one entry per user, keeping query order
pub fn group_user_roles(rows: Vec<UserRoleRow>) -> Vec<UserMultiple> {
    let mut users: Vec<UserMultiple> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for row in rows {
        let position = match index.get(&row.user.id) {
            Some(&i) => i,
            None => {
                index.insert(row.user.id.clone(), users.len());
                users.push(UserMultiple {
                    user: row.user,
                    roles: Vec::new(),
                });
                users.len() - 1
            }
        };
        if let Some(role) = row.role {
            users[position].roles.push(role);
        }
    }

    users
}

/// One row of the "me" query: user, optional person, optional role
#[derive(Debug, Clone, PartialEq)]
pub struct UserMeRow {
    pub id: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub person: Option<Person>,
    pub role: Option<RoleUser>,
}

impl<'r> FromRow<'r, MySqlRow> for UserMeRow {
    fn from_row(row: &'r MySqlRow) -> Result<Self, sqlx::Error> {
        let person_id: Option<String> = row.try_get("person_id")?;
        let person = match person_id {
            Some(id) => Some(Person {
                id,
                type_document_id: row.try_get("person_type_document_id")?,
                document: row.try_get("person_document")?,
                names: row.try_get("person_names")?,
                surname: row.try_get("person_surname")?,
                last_name: row.try_get("person_last_name")?,
                phone: row.try_get("person_phone")?,
                email: row.try_get("person_email")?,
                gender: row.try_get("person_gender")?,
                enable: row.try_get("person_enable")?,
            }),
            None => None,
        };

        let role_id: Option<String> = row.try_get("role_id")?;
        let role = match role_id {
            Some(id) => Some(RoleUser {
                id,
                name: row.try_get("role_name")?,
                description: row.try_get("role_description")?,
                enable: row.try_get("role_enable")?,
            }),
            None => None,
        };

        Ok(Self {
            id: row.try_get("user_id")?,
            username: row.try_get("user_username")?,
            created_at: row.try_get("user_created_at")?,
            person,
            role,
        })
    }
}

/// Builds the caller's profile from its rows; stores and merchants are filled later
pub fn assemble_user_me(rows: Vec<UserMeRow>) -> Option<UserMe> {
    let mut rows = rows.into_iter();
    let first = rows.next()?;

    let mut me = UserMe {
        id: first.id,
        username: first.username,
        created_at: first.created_at,
        person: first.person,
        roles: first.role.into_iter().collect(),
        stores: Vec::new(),
        merchants: Vec::new(),
    };

    for row in rows {
        if let Some(role) = row.role {
            if !me.roles.iter().any(|r| r.id == role.id) {
                me.roles.push(role);
            }
        }
    }

    Some(me)
}
