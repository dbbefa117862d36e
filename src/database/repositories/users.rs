use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlConnection, Row};
use std::sync::Arc;

use crate::database::manager::{ConnectionProvider, DatabaseError, TenantId};
use crate::database::models::user::{assemble_user_me, group_user_roles};
use crate::database::models::{
    MenuRow, MerchantByUser, NewUser, PersonData, PersonWrite, RoleLink, StoreByUser, UserCredentials, UserFilter,
    UserMe, UserMeRow, UserMultiple, UserRoleRow, UserUpdate,
};
use crate::database::query_builder::{bind_query, bind_query_as, FilterBuilder};
use crate::database::transaction::{commit_or_rollback, expect_affected};
use crate::pagination::Pagination;

const USER_ROLE_COLUMNS: &str = r#"
    SELECT u.id AS user_id, u.username AS user_username, u.created_at AS user_created_at,
           ut.id AS user_type_id, ut.description AS user_type_description, ut.code AS user_type_code,
           r.id AS role_id, r.name AS role_name, r.description AS role_description,
           r.enable AS role_enable, r.created_at AS role_created_at,
           ur.id AS user_role_id, ur.enable AS user_role_enable, ur.created_at AS user_role_created_at
"#;

const USER_ROLE_JOINS: &str = r#"
    INNER JOIN core_user_types ut ON ut.id = u.user_type_id
    LEFT JOIN core_users_roles ur ON ur.user_id = u.id AND ur.deleted_at IS NULL
    LEFT JOIN core_roles r ON r.id = ur.role_id AND r.deleted_at IS NULL
"#;

// Page ids and totals both require the user type row, like the listing join
const SELECT_USER_IDS: &str =
    "SELECT u.id, u.created_at FROM core_users u INNER JOIN core_user_types ut ON ut.id = u.user_type_id";
const FROM_USERS: &str = "FROM core_users u INNER JOIN core_user_types ut ON ut.id = u.user_type_id";

const SELECT_CREDENTIALS: &str = r#"
    SELECT id, username, password FROM core_users
    WHERE username = ? AND deleted_at IS NULL
    LIMIT 1
"#;

const COUNT_USERNAME: &str =
    "SELECT COUNT(*) AS total FROM core_users WHERE username = ? AND deleted_at IS NULL AND id <> ?";

const SELECT_PERSON_BY_DOCUMENT: &str = r#"
    SELECT id FROM core_persons
    WHERE type_document_id = ? AND document = ? AND deleted_at IS NULL
    LIMIT 1
"#;

const INSERT_PERSON: &str = r#"
    INSERT INTO core_persons
        (id, type_document_id, document, names, surname, last_name, phone, email, gender, enable, created_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

const UPDATE_PERSON: &str = r#"
    UPDATE core_persons
    SET type_document_id = ?, document = ?, names = ?, surname = ?, last_name = ?,
        phone = ?, email = ?, gender = ?, enable = ?, updated_at = ?
    WHERE id = ? AND deleted_at IS NULL
"#;

const INSERT_USER: &str = r#"
    INSERT INTO core_users (id, username, password, user_type_id, person_id, created_at)
    VALUES (?, ?, ?, ?, ?, ?)
"#;

const UPDATE_USER: &str = r#"
    UPDATE core_users
    SET username = ?, user_type_id = ?, person_id = COALESCE(?, person_id), updated_at = ?
    WHERE id = ? AND deleted_at IS NULL
"#;

const INSERT_USER_ROLE: &str = r#"
    INSERT INTO core_users_roles (id, user_id, role_id, enable, created_at)
    VALUES (?, ?, ?, 1, ?)
"#;

const DELETE_USER_ROLES: &str =
    "UPDATE core_users_roles SET deleted_at = ? WHERE user_id = ? AND deleted_at IS NULL";

const DELETE_USER: &str = "UPDATE core_users SET deleted_at = ? WHERE id = ? AND deleted_at IS NULL";

const UPDATE_PASSWORD: &str =
    "UPDATE core_users SET password = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL";

const SELECT_ME: &str = r#"
    SELECT u.id AS user_id, u.username AS user_username, u.created_at AS user_created_at,
           p.id AS person_id, p.type_document_id AS person_type_document_id, p.document AS person_document,
           p.names AS person_names, p.surname AS person_surname, p.last_name AS person_last_name,
           p.phone AS person_phone, p.email AS person_email, p.gender AS person_gender,
           p.enable AS person_enable,
           r.id AS role_id, r.name AS role_name, r.description AS role_description, r.enable AS role_enable
    FROM core_users u
    LEFT JOIN core_persons p ON p.id = u.person_id AND p.deleted_at IS NULL
    LEFT JOIN core_users_roles ur ON ur.user_id = u.id AND ur.deleted_at IS NULL
    LEFT JOIN core_roles r ON r.id = ur.role_id AND r.deleted_at IS NULL
    WHERE u.id = ? AND u.deleted_at IS NULL
"#;

const SELECT_STORES_BY_USER: &str = r#"
    SELECT s.id, s.name, s.shortname, s.merchant_id
    FROM core_stores s
    INNER JOIN core_users_stores us ON us.store_id = s.id AND us.deleted_at IS NULL
    WHERE us.user_id = ? AND s.deleted_at IS NULL
    ORDER BY s.name
"#;

const SELECT_MERCHANTS_BY_USER: &str = r#"
    SELECT DISTINCT m.id, m.name, m.description, m.document
    FROM core_merchants m
    INNER JOIN core_stores s ON s.merchant_id = m.id AND s.deleted_at IS NULL
    INNER JOIN core_users_stores us ON us.store_id = s.id AND us.deleted_at IS NULL
    WHERE us.user_id = ? AND m.deleted_at IS NULL
    ORDER BY m.name
"#;

const SELECT_MENU: &str = r#"
    SELECT DISTINCT
           m.id AS module_id, m.name AS module_name, m.description AS module_description,
           m.code AS module_code, m.icon AS module_icon, m.position AS module_position,
           m.created_at AS module_created_at,
           v.id AS view_id, v.name AS view_name, v.description AS view_description, v.url AS view_url,
           v.icon AS view_icon, v.position AS view_position, v.created_at AS view_created_at
    FROM core_users_roles ur
    INNER JOIN core_roles r ON r.id = ur.role_id AND r.deleted_at IS NULL AND r.enable = 1
    INNER JOIN core_role_policies rp ON rp.role_id = r.id AND rp.deleted_at IS NULL AND rp.enable = 1
    INNER JOIN core_policy_permissions pp ON pp.policy_id = rp.policy_id AND pp.deleted_at IS NULL AND pp.enable = 1
    INNER JOIN core_views_permissions vp ON vp.permission_id = pp.permission_id AND vp.deleted_at IS NULL
    INNER JOIN core_views v ON v.id = vp.view_id AND v.deleted_at IS NULL
    INNER JOIN core_modules m ON m.id = v.module_id AND m.deleted_at IS NULL
    WHERE ur.user_id = ? AND ur.deleted_at IS NULL AND ur.enable = 1
    ORDER BY m.position, m.code, v.position
"#;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get_users(
        &self,
        tenant: &TenantId,
        filter: &UserFilter,
        pagination: &Pagination,
    ) -> Result<Vec<UserMultiple>, DatabaseError>;

    async fn get_total_users(&self, tenant: &TenantId, filter: &UserFilter) -> Result<i64, DatabaseError>;

    async fn get_user(&self, tenant: &TenantId, id: &str) -> Result<Option<UserMultiple>, DatabaseError>;

    async fn get_credentials(&self, tenant: &TenantId, username: &str) -> Result<Option<UserCredentials>, DatabaseError>;

    /// True when another live user already owns `username`
    async fn username_taken(
        &self,
        tenant: &TenantId,
        username: &str,
        except_id: Option<&str>,
    ) -> Result<bool, DatabaseError>;

    async fn find_person_by_document(
        &self,
        tenant: &TenantId,
        type_document_id: &str,
        document: &str,
    ) -> Result<Option<String>, DatabaseError>;

    /// Person write, user insert and role links in one transaction
    async fn create_user(&self, tenant: &TenantId, user: &NewUser) -> Result<(), DatabaseError>;

    async fn update_user(&self, tenant: &TenantId, user: &UserUpdate) -> Result<(), DatabaseError>;

    async fn delete_user(&self, tenant: &TenantId, id: &str, at: DateTime<Utc>) -> Result<(), DatabaseError>;

    async fn update_password(
        &self,
        tenant: &TenantId,
        id: &str,
        password_hash: &str,
        at: DateTime<Utc>,
    ) -> Result<(), DatabaseError>;

    /// Profile with person and roles; stores and merchants are left empty
    async fn get_me(&self, tenant: &TenantId, user_id: &str) -> Result<Option<UserMe>, DatabaseError>;

    async fn get_stores_by_user(&self, tenant: &TenantId, user_id: &str) -> Result<Vec<StoreByUser>, DatabaseError>;

    async fn get_merchants_by_user(&self, tenant: &TenantId, user_id: &str) -> Result<Vec<MerchantByUser>, DatabaseError>;

    async fn get_menu_rows(&self, tenant: &TenantId, user_id: &str) -> Result<Vec<MenuRow>, DatabaseError>;
}

/// Conditions shared by the user page and the total queries
pub fn user_filter(filter: &UserFilter) -> FilterBuilder {
    FilterBuilder::new()
        .raw("u.deleted_at IS NULL")
        .contains_opt("u.username", filter.username.as_deref())
        .eq_opt("u.user_type_id", filter.user_type_id.as_deref())
}

/// Page of user ids joined back to users, types and roles
pub fn users_page_sql(builder: &FilterBuilder) -> String {
    let page = builder.select_sql(SELECT_USER_IDS, "u.created_at DESC, u.id");
    format!(
        "{} FROM ({page}) page INNER JOIN core_users u ON u.id = page.id {} ORDER BY page.created_at DESC, page.id, ur.created_at",
        USER_ROLE_COLUMNS.trim(),
        USER_ROLE_JOINS.trim()
    )
}

fn user_by_id_sql() -> String {
    format!(
        "{} FROM core_users u {} WHERE u.id = ? AND u.deleted_at IS NULL ORDER BY ur.created_at",
        USER_ROLE_COLUMNS.trim(),
        USER_ROLE_JOINS.trim()
    )
}

async fn write_person(
    conn: &mut MySqlConnection,
    person: &PersonWrite,
    at: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    match person {
        PersonWrite::Keep | PersonWrite::Link(_) => Ok(()),
        PersonWrite::Create { id, data } => {
            bind_person(sqlx::query(INSERT_PERSON).bind(id), data)
                .bind(at)
                .execute(&mut *conn)
                .await
                .map_err(DatabaseError::query("write_person"))?;
            Ok(())
        }
        PersonWrite::Update { id, data } => {
            let done = bind_person(sqlx::query(UPDATE_PERSON), data)
                .bind(at)
                .bind(id)
                .execute(&mut *conn)
                .await
                .map_err(DatabaseError::query("write_person"))?;
            expect_affected(done.rows_affected(), "write_person")
        }
    }
}

fn bind_person<'q>(
    q: sqlx::query::Query<'q, sqlx::MySql, sqlx::mysql::MySqlArguments>,
    data: &'q PersonData,
) -> sqlx::query::Query<'q, sqlx::MySql, sqlx::mysql::MySqlArguments> {
    q.bind(&data.type_document_id)
        .bind(&data.document)
        .bind(&data.names)
        .bind(&data.surname)
        .bind(&data.last_name)
        .bind(&data.phone)
        .bind(&data.email)
        .bind(&data.gender)
        .bind(data.enable)
}

async fn insert_roles(
    conn: &mut MySqlConnection,
    user_id: &str,
    roles: &[RoleLink],
    at: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    for role in roles {
        sqlx::query(INSERT_USER_ROLE)
            .bind(&role.id)
            .bind(user_id)
            .bind(&role.role_id)
            .bind(at)
            .execute(&mut *conn)
            .await
            .map_err(DatabaseError::query("insert_roles"))?;
    }
    Ok(())
}

pub struct MySqlUserRepository {
    provider: Arc<dyn ConnectionProvider>,
}

impl MySqlUserRepository {
    pub fn new(provider: Arc<dyn ConnectionProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl UserRepository for MySqlUserRepository {
    async fn get_users(
        &self,
        tenant: &TenantId,
        filter: &UserFilter,
        pagination: &Pagination,
    ) -> Result<Vec<UserMultiple>, DatabaseError> {
        let pool = self.provider.pool(tenant).await?;
        let builder = user_filter(filter);
        let sql = users_page_sql(&builder);
        let args = builder.page_args(pagination);

        let rows = bind_query_as(sqlx::query_as::<_, UserRoleRow>(&sql), &args)
            .fetch_all(&pool)
            .await
            .map_err(DatabaseError::query("get_users"))?;
        Ok(group_user_roles(rows))
    }

    async fn get_total_users(&self, tenant: &TenantId, filter: &UserFilter) -> Result<i64, DatabaseError> {
        let pool = self.provider.pool(tenant).await?;
        let builder = user_filter(filter);
        let sql = builder.count_sql(FROM_USERS);

        let row = bind_query(sqlx::query(&sql), builder.args())
            .fetch_one(&pool)
            .await
            .map_err(DatabaseError::query("get_total_users"))?;
        row.try_get("total").map_err(DatabaseError::query("get_total_users"))
    }

    async fn get_user(&self, tenant: &TenantId, id: &str) -> Result<Option<UserMultiple>, DatabaseError> {
        let pool = self.provider.pool(tenant).await?;
        let sql = user_by_id_sql();
        let rows = sqlx::query_as::<_, UserRoleRow>(&sql)
            .bind(id)
            .fetch_all(&pool)
            .await
            .map_err(DatabaseError::query("get_user"))?;
        Ok(group_user_roles(rows).into_iter().next())
    }

    async fn get_credentials(&self, tenant: &TenantId, username: &str) -> Result<Option<UserCredentials>, DatabaseError> {
        let pool = self.provider.pool(tenant).await?;
        sqlx::query_as::<_, UserCredentials>(SELECT_CREDENTIALS)
            .bind(username)
            .fetch_optional(&pool)
            .await
            .map_err(DatabaseError::query("get_credentials"))
    }

    async fn username_taken(
        &self,
        tenant: &TenantId,
        username: &str,
        except_id: Option<&str>,
    ) -> Result<bool, DatabaseError> {
        let pool = self.provider.pool(tenant).await?;
        let row = sqlx::query(COUNT_USERNAME)
            .bind(username)
            .bind(except_id.unwrap_or(""))
            .fetch_one(&pool)
            .await
            .map_err(DatabaseError::query("username_taken"))?;
        let total: i64 = row.try_get("total").map_err(DatabaseError::query("username_taken"))?;
        Ok(total > 0)
    }

    async fn find_person_by_document(
        &self,
        tenant: &TenantId,
        type_document_id: &str,
        document: &str,
    ) -> Result<Option<String>, DatabaseError> {
        let pool = self.provider.pool(tenant).await?;
        let row = sqlx::query(SELECT_PERSON_BY_DOCUMENT)
            .bind(type_document_id)
            .bind(document)
            .fetch_optional(&pool)
            .await
            .map_err(DatabaseError::query("find_person_by_document"))?;
        row.map(|r| r.try_get("id"))
            .transpose()
            .map_err(DatabaseError::query("find_person_by_document"))
    }

    async fn create_user(&self, tenant: &TenantId, user: &NewUser) -> Result<(), DatabaseError> {
        let pool = self.provider.pool(tenant).await?;
        let mut tx = pool.begin().await.map_err(DatabaseError::query("create_user"))?;

        let result = async {
            write_person(&mut tx, &user.person, user.created_at).await?;
            sqlx::query(INSERT_USER)
                .bind(&user.id)
                .bind(&user.username)
                .bind(&user.password_hash)
                .bind(&user.user_type_id)
                .bind(user.person.person_id())
                .bind(user.created_at)
                .execute(&mut *tx)
                .await
                .map_err(DatabaseError::query("create_user"))?;
            insert_roles(&mut tx, &user.id, &user.roles, user.created_at).await
        }
        .await;

        commit_or_rollback(tx, result, "create_user").await
    }

    async fn update_user(&self, tenant: &TenantId, user: &UserUpdate) -> Result<(), DatabaseError> {
        let pool = self.provider.pool(tenant).await?;
        let mut tx = pool.begin().await.map_err(DatabaseError::query("update_user"))?;

        let result = async {
            write_person(&mut tx, &user.person, user.updated_at).await?;
            let done = sqlx::query(UPDATE_USER)
                .bind(&user.username)
                .bind(&user.user_type_id)
                .bind(user.person.person_id())
                .bind(user.updated_at)
                .bind(&user.id)
                .execute(&mut *tx)
                .await
                .map_err(DatabaseError::query("update_user"))?;
            expect_affected(done.rows_affected(), "update_user")?;

            if let Some(roles) = &user.roles {
                sqlx::query(DELETE_USER_ROLES)
                    .bind(user.updated_at)
                    .bind(&user.id)
                    .execute(&mut *tx)
                    .await
                    .map_err(DatabaseError::query("update_user"))?;
                insert_roles(&mut tx, &user.id, roles, user.updated_at).await?;
            }
            Ok::<(), DatabaseError>(())
        }
        .await;

        commit_or_rollback(tx, result, "update_user").await
    }

    async fn delete_user(&self, tenant: &TenantId, id: &str, at: DateTime<Utc>) -> Result<(), DatabaseError> {
        let pool = self.provider.pool(tenant).await?;
        let done = sqlx::query(DELETE_USER)
            .bind(at)
            .bind(id)
            .execute(&pool)
            .await
            .map_err(DatabaseError::query("delete_user"))?;
        expect_affected(done.rows_affected(), "delete_user")
    }

    async fn update_password(
        &self,
        tenant: &TenantId,
        id: &str,
        password_hash: &str,
        at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let pool = self.provider.pool(tenant).await?;
        let done = sqlx::query(UPDATE_PASSWORD)
            .bind(password_hash)
            .bind(at)
            .bind(id)
            .execute(&pool)
            .await
            .map_err(DatabaseError::query("update_password"))?;
        expect_affected(done.rows_affected(), "update_password")
    }

    async fn get_me(&self, tenant: &TenantId, user_id: &str) -> Result<Option<UserMe>, DatabaseError> {
        let pool = self.provider.pool(tenant).await?;
        let rows = sqlx::query_as::<_, UserMeRow>(SELECT_ME)
            .bind(user_id)
            .fetch_all(&pool)
            .await
            .map_err(DatabaseError::query("get_me"))?;
        Ok(assemble_user_me(rows))
    }

    async fn get_stores_by_user(&self, tenant: &TenantId, user_id: &str) -> Result<Vec<StoreByUser>, DatabaseError> {
        let pool = self.provider.pool(tenant).await?;
        sqlx::query_as::<_, StoreByUser>(SELECT_STORES_BY_USER)
            .bind(user_id)
            .fetch_all(&pool)
            .await
            .map_err(DatabaseError::query("get_stores_by_user"))
    }

    async fn get_merchants_by_user(&self, tenant: &TenantId, user_id: &str) -> Result<Vec<MerchantByUser>, DatabaseError> {
        let pool = self.provider.pool(tenant).await?;
        sqlx::query_as::<_, MerchantByUser>(SELECT_MERCHANTS_BY_USER)
            .bind(user_id)
            .fetch_all(&pool)
            .await
            .map_err(DatabaseError::query("get_merchants_by_user"))
    }

    async fn get_menu_rows(&self, tenant: &TenantId, user_id: &str) -> Result<Vec<MenuRow>, DatabaseError> {
        let pool = self.provider.pool(tenant).await?;
        sqlx::query_as::<_, MenuRow>(SELECT_MENU)
            .bind(user_id)
            .fetch_all(&pool)
            .await
            .map_err(DatabaseError::query("get_menu_rows"))
    }
}
