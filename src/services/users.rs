use axum::http::StatusCode;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::{self, JoinError};
use tokio::time::error::Elapsed;
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

use super::menu::{build_menu, group_menu_rows};
use super::{bounded, fetch_page, Clock};
use crate::database::models::{
    MenuModule, NewUser, PersonData, PersonWrite, RoleLink, UserFilter, UserMe, UserMultiple, UserUpdate,
};
use crate::database::repositories::UserRepository;
use crate::database::{DatabaseError, ExistsCheck, RecordExists, TenantId};
use crate::error::{ErrorLayer, SmartError};
use crate::pagination::{Page, Pagination};

const USERS: &str = "core_users";
const USER_TYPES: &str = "core_user_types";
const ROLES: &str = "core_roles";
const PERSONS: &str = "core_persons";

#[derive(Debug, Error)]
pub enum UserError {
    #[error("username {0} already exists")]
    AlreadyExist(String),

    #[error("user type {0} not found")]
    UserTypeNotFound(String),

    #[error("role {0} not found")]
    RoleNotFound(String),

    #[error("person {0} not found")]
    PersonNotFound(String),

    #[error("user {0} has been deleted")]
    IdHasBeenDeleted(String),

    #[error("user {0} not found")]
    NotFound(String),

    #[error("password hashing failed: {0}")]
    PasswordHash(#[from] bcrypt::BcryptError),

    #[error("password hashing task failed: {0}")]
    HashTask(#[from] JoinError),

    #[error("users use case timed out")]
    Timeout(#[from] Elapsed),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<UserError> for SmartError {
    fn from(err: UserError) -> Self {
        let domain = |code, message, status, raw: String| {
            SmartError::new(code, message, status, ErrorLayer::Domain).with_raw(raw)
        };
        match err {
            UserError::AlreadyExist(username) => domain(
                "ERR_USER_ALREADY_EXIST",
                "A user with this username already exists",
                StatusCode::CONFLICT,
                username,
            ),
            UserError::UserTypeNotFound(id) => domain(
                "ERR_USER_TYPE_NOT_FOUND",
                "The user type does not exist",
                StatusCode::NOT_FOUND,
                id,
            ),
            UserError::RoleNotFound(id) => {
                domain("ERR_ROLE_NOT_FOUND", "The role does not exist", StatusCode::NOT_FOUND, id)
            }
            UserError::PersonNotFound(id) => {
                domain("ERR_PERSON_NOT_FOUND", "The person does not exist", StatusCode::NOT_FOUND, id)
            }
            UserError::IdHasBeenDeleted(id) => domain(
                "ERR_USER_ID_HAS_BEEN_DELETED",
                "The user does not exist or has been deleted",
                StatusCode::NOT_FOUND,
                id,
            ),
            UserError::NotFound(id) => {
                domain("ERR_USER_NOT_FOUND", "The user does not exist", StatusCode::NOT_FOUND, id)
            }
            UserError::PasswordHash(e) => SmartError::unknown().with_function("hash_password").with_raw(e),
            UserError::HashTask(e) => SmartError::unknown().with_function("hash_password").with_raw(e),
            UserError::Timeout(_) => SmartError::timeout("users"),
            UserError::Database(e) => e.into(),
        }
    }
}

fn enabled() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PersonInput {
    #[validate(length(min = 1, message = "type_document_id is required"))]
    pub type_document_id: String,

    #[validate(length(min = 1, max = 20, message = "document must have between 1 and 20 characters"))]
    pub document: String,

    #[validate(length(min = 1, max = 100, message = "names is required"))]
    pub names: String,

    #[validate(length(min = 1, max = 100, message = "surname is required"))]
    pub surname: String,

    pub last_name: Option<String>,

    #[validate(length(max = 20))]
    pub phone: Option<String>,

    #[validate(email(message = "email is not valid"))]
    pub email: Option<String>,

    pub gender: Option<String>,

    #[serde(default = "enabled")]
    pub enable: bool,
}

impl From<PersonInput> for PersonData {
    fn from(p: PersonInput) -> Self {
        Self {
            type_document_id: p.type_document_id,
            document: p.document,
            names: p.names,
            surname: p.surname,
            last_name: p.last_name,
            phone: p.phone,
            email: p.email,
            gender: p.gender,
            enable: p.enable,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateUser {
    #[validate(length(min = 3, max = 50, message = "username must have between 3 and 50 characters"))]
    pub username: String,

    #[validate(length(min = 8, max = 72, message = "password must have between 8 and 72 characters"))]
    pub password: String,

    #[validate(length(min = 1, message = "user_type_id is required"))]
    pub user_type_id: String,

    pub person_id: Option<String>,

    #[validate(nested)]
    pub person: Option<PersonInput>,

    #[serde(default)]
    pub role_ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateUser {
    #[validate(length(min = 3, max = 50, message = "username must have between 3 and 50 characters"))]
    pub username: String,

    #[validate(length(min = 1, message = "user_type_id is required"))]
    pub user_type_id: String,

    pub person_id: Option<String>,

    #[validate(nested)]
    pub person: Option<PersonInput>,

    /// Replaces the user's roles when present
    pub role_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ChangePassword {
    #[validate(length(min = 8, max = 72, message = "password must have between 8 and 72 characters"))]
    pub password: String,

    #[validate(must_match(other = "password", message = "confirm_password must match password"))]
    pub confirm_password: String,
}

pub struct UserService {
    repo: Arc<dyn UserRepository>,
    exists: Arc<dyn RecordExists>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
    hash_cost: u32,
}

impl UserService {
    pub fn new(
        repo: Arc<dyn UserRepository>,
        exists: Arc<dyn RecordExists>,
        clock: Arc<dyn Clock>,
        timeout: Duration,
        hash_cost: u32,
    ) -> Self {
        Self {
            repo,
            exists,
            clock,
            timeout,
            hash_cost,
        }
    }

    async fn is_active(&self, tenant: &TenantId, table: &'static str, id: &str) -> Result<bool, UserError> {
        Ok(self.exists.record_exists(tenant, ExistsCheck::active_id(table, id)).await?)
    }

    async fn ensure_user_type(&self, tenant: &TenantId, user_type_id: &str) -> Result<(), UserError> {
        if !self.is_active(tenant, USER_TYPES, user_type_id).await? {
            return Err(UserError::UserTypeNotFound(user_type_id.to_string()));
        }
        Ok(())
    }

    /// Checks every role and builds one link per distinct role id
    async fn role_links(&self, tenant: &TenantId, role_ids: &[String]) -> Result<Vec<RoleLink>, UserError> {
        let mut seen = HashSet::new();
        let mut links = Vec::with_capacity(role_ids.len());
        for role_id in role_ids {
            if !seen.insert(role_id.as_str()) {
                continue;
            }
            if !self.is_active(tenant, ROLES, role_id).await? {
                return Err(UserError::RoleNotFound(role_id.clone()));
            }
            links.push(RoleLink {
                id: Uuid::new_v4().to_string(),
                role_id: role_id.clone(),
            });
        }
        Ok(links)
    }

    /// An embedded person wins over `person_id`. It updates the person with the
    /// same document when there is one and creates it otherwise.
    async fn resolve_person(
        &self,
        tenant: &TenantId,
        person_id: Option<String>,
        person: Option<PersonInput>,
    ) -> Result<PersonWrite, UserError> {
        if let Some(input) = person {
            let existing = self
                .repo
                .find_person_by_document(tenant, &input.type_document_id, &input.document)
                .await?;
            let data = PersonData::from(input);
            return Ok(match existing {
                Some(id) => PersonWrite::Update { id, data },
                None => PersonWrite::Create {
                    id: Uuid::new_v4().to_string(),
                    data,
                },
            });
        }

        match person_id {
            Some(id) if self.is_active(tenant, PERSONS, &id).await? => Ok(PersonWrite::Link(id)),
            Some(id) => Err(UserError::PersonNotFound(id)),
            None => Ok(PersonWrite::Keep),
        }
    }

    /// Hashes on the blocking pool so the runtime and the use-case timeout keep running
    async fn hash_password(&self, password: &str) -> Result<String, UserError> {
        let (password, cost) = (password.to_owned(), self.hash_cost);
        Ok(task::spawn_blocking(move || bcrypt::hash(password, cost)).await??)
    }

    async fn load_user(&self, tenant: &TenantId, id: &str) -> Result<UserMultiple, UserError> {
        self.repo
            .get_user(tenant, id)
            .await?
            .ok_or_else(|| UserError::NotFound(id.to_string()))
    }

    pub async fn get_users(
        &self,
        tenant: &TenantId,
        filter: &UserFilter,
        pagination: &Pagination,
    ) -> Result<Page<UserMultiple>, UserError> {
        debug!(%tenant, ?filter, "Listing users");
        bounded(self.timeout, async {
            fetch_page(
                pagination,
                self.repo.get_users(tenant, filter, pagination),
                self.repo.get_total_users(tenant, filter),
            )
            .await
            .map_err(UserError::from)
        })
        .await
    }

    pub async fn get_user(&self, tenant: &TenantId, id: &str) -> Result<UserMultiple, UserError> {
        bounded(self.timeout, self.load_user(tenant, id)).await
    }

    pub async fn create_user(&self, tenant: &TenantId, input: CreateUser) -> Result<UserMultiple, UserError> {
        bounded(self.timeout, async {
            if self.repo.username_taken(tenant, &input.username, None).await? {
                return Err(UserError::AlreadyExist(input.username));
            }
            self.ensure_user_type(tenant, &input.user_type_id).await?;
            let roles = self.role_links(tenant, &input.role_ids).await?;
            let person = self.resolve_person(tenant, input.person_id, input.person).await?;

            let user = NewUser {
                id: Uuid::new_v4().to_string(),
                username: input.username,
                password_hash: self.hash_password(&input.password).await?,
                user_type_id: input.user_type_id,
                person,
                roles,
                created_at: self.clock.now(),
            };
            self.repo.create_user(tenant, &user).await?;

            info!(%tenant, id = %user.id, username = %user.username, "Created user");
            self.load_user(tenant, &user.id).await
        })
        .await
    }

    pub async fn update_user(&self, tenant: &TenantId, id: &str, input: UpdateUser) -> Result<UserMultiple, UserError> {
        bounded(self.timeout, async {
            if !self.is_active(tenant, USERS, id).await? {
                return Err(UserError::NotFound(id.to_string()));
            }
            if self.repo.username_taken(tenant, &input.username, Some(id)).await? {
                return Err(UserError::AlreadyExist(input.username));
            }
            self.ensure_user_type(tenant, &input.user_type_id).await?;
            let roles = match &input.role_ids {
                Some(role_ids) => Some(self.role_links(tenant, role_ids).await?),
                None => None,
            };
            let person = self.resolve_person(tenant, input.person_id, input.person).await?;

            let update = UserUpdate {
                id: id.to_string(),
                username: input.username,
                user_type_id: input.user_type_id,
                person,
                roles,
                updated_at: self.clock.now(),
            };
            match self.repo.update_user(tenant, &update).await {
                Err(DatabaseError::NoRowsAffected { .. }) => return Err(UserError::NotFound(id.to_string())),
                other => other?,
            }

            info!(%tenant, id, "Updated user");
            self.load_user(tenant, id).await
        })
        .await
    }

    pub async fn delete_user(&self, tenant: &TenantId, id: &str) -> Result<(), UserError> {
        bounded(self.timeout, async {
            if !self.is_active(tenant, USERS, id).await? {
                return Err(UserError::IdHasBeenDeleted(id.to_string()));
            }
            match self.repo.delete_user(tenant, id, self.clock.now()).await {
                Err(DatabaseError::NoRowsAffected { .. }) => return Err(UserError::IdHasBeenDeleted(id.to_string())),
                other => other?,
            }

            info!(%tenant, id, "Deleted user");
            Ok(())
        })
        .await
    }

    pub async fn change_password(&self, tenant: &TenantId, id: &str, input: ChangePassword) -> Result<(), UserError> {
        bounded(self.timeout, async {
            if !self.is_active(tenant, USERS, id).await? {
                return Err(UserError::NotFound(id.to_string()));
            }
            let hash = self.hash_password(&input.password).await?;
            match self.repo.update_password(tenant, id, &hash, self.clock.now()).await {
                Err(DatabaseError::NoRowsAffected { .. }) => return Err(UserError::NotFound(id.to_string())),
                other => other?,
            }

            info!(%tenant, id, "Changed user password");
            Ok(())
        })
        .await
    }

    /// Profile, stores and merchants are read concurrently
    pub async fn get_me(&self, tenant: &TenantId, user_id: &str) -> Result<UserMe, UserError> {
        bounded(self.timeout, async {
            let (me, stores, merchants) = tokio::try_join!(
                self.repo.get_me(tenant, user_id),
                self.repo.get_stores_by_user(tenant, user_id),
                self.repo.get_merchants_by_user(tenant, user_id),
            )?;

            let mut me = me.ok_or_else(|| UserError::NotFound(user_id.to_string()))?;
            me.stores = stores;
            me.merchants = merchants;
            Ok(me)
        })
        .await
    }

    pub async fn get_menu(&self, tenant: &TenantId, user_id: &str) -> Result<Vec<MenuModule>, UserError> {
        bounded(self.timeout, async {
            let rows = self.repo.get_menu_rows(tenant, user_id).await?;
            debug!(%tenant, user_id, rows = rows.len(), "Building menu");
            Ok(build_menu(group_menu_rows(rows)))
        })
        .await
    }
}
