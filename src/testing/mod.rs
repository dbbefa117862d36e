//! In-memory collaborators for use-case and router tests.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::auth::{Claims, JwtKeys};
use crate::config::AppConfig;
use crate::database::models::{
    EconomicActivity, EconomicActivityFilter, MenuRow, MerchantByUser, NewJoinRow, NewUser, PolicyPermission, Role,
    RolePolicy, StoreByUser, User, UserCredentials, UserFilter, UserMe, UserMultiple, UserRole, UserType, UserUpdate,
};
use crate::database::repositories::{EconomicActivityRepository, JoinRowRepository, UserRepository};
use crate::database::{ConnectionProvider, DatabaseError, ExistsCheck, RecordExists, TenantId};
use crate::pagination::Pagination;
use crate::services::{
    AuthService, Clock, EconomicActivityService, PolicyPermissionService, RolePolicyService, UserService,
};
use crate::state::AppState;

pub const TENANT: &str = "acme";

pub fn tenant() -> TenantId {
    TenantId::parse(TENANT).unwrap()
}

fn page_of<T: Clone>(items: &[T], pagination: &Pagination) -> Vec<T> {
    items
        .iter()
        .skip(pagination.offset() as usize)
        .take(pagination.limit() as usize)
        .cloned()
        .collect()
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Default for FixedClock {
    fn default() -> Self {
        Self(Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Live rows keyed by (table, column, value)
#[derive(Default)]
pub struct FakeRecordExists {
    rows: Mutex<HashSet<(String, String, String)>>,
}

impl FakeRecordExists {
    pub fn insert(&self, table: &str, column: &str, value: &str) {
        self.rows
            .lock()
            .unwrap()
            .insert((table.to_string(), column.to_string(), value.to_string()));
    }
}

#[async_trait]
impl RecordExists for FakeRecordExists {
    async fn record_exists(&self, _tenant: &TenantId, check: ExistsCheck<'_>) -> Result<bool, DatabaseError> {
        let key = (check.table.to_string(), check.column.to_string(), check.value.to_string());
        Ok(self.rows.lock().unwrap().contains(&key))
    }
}

/// Provider whose pools are never connected
pub struct FakeProvider {
    pub healthy: AtomicBool,
}

impl Default for FakeProvider {
    fn default() -> Self {
        Self {
            healthy: AtomicBool::new(true),
        }
    }
}

#[async_trait]
impl ConnectionProvider for FakeProvider {
    async fn pool(&self, _tenant: &TenantId) -> Result<MySqlPool, DatabaseError> {
        Ok(MySqlPoolOptions::new()
            .acquire_timeout(Duration::from_millis(50))
            .connect_lazy_with(MySqlConnectOptions::new()))
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DatabaseError::NoRowsAffected { function: "health_check" })
        }
    }
}

#[derive(Default)]
pub struct FakeEconomicActivities {
    rows: Mutex<Vec<EconomicActivity>>,
    filters: Mutex<Vec<EconomicActivityFilter>>,
}

impl FakeEconomicActivities {
    pub fn rows(&self) -> Vec<EconomicActivity> {
        self.rows.lock().unwrap().clone()
    }

    /// Filters received by list and total calls, in call order
    pub fn seen_filters(&self) -> Vec<EconomicActivityFilter> {
        self.filters.lock().unwrap().clone()
    }

    fn matching(&self, filter: &EconomicActivityFilter) -> Vec<EconomicActivity> {
        self.filters.lock().unwrap().push(filter.clone());
        self.rows
            .lock()
            .unwrap()
            .iter()
            .filter(|a| filter.cuui_id.as_ref().map_or(true, |c| &a.cuui_id == c))
            .filter(|a| filter.description.as_ref().map_or(true, |d| a.description.contains(d.as_str())))
            .filter(|a| filter.status.map_or(true, |s| a.status == s))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EconomicActivityRepository for FakeEconomicActivities {
    async fn get_economic_activities(
        &self,
        _tenant: &TenantId,
        filter: &EconomicActivityFilter,
        pagination: &Pagination,
    ) -> Result<Vec<EconomicActivity>, DatabaseError> {
        Ok(page_of(&self.matching(filter), pagination))
    }

    async fn get_total_economic_activities(
        &self,
        _tenant: &TenantId,
        filter: &EconomicActivityFilter,
    ) -> Result<i64, DatabaseError> {
        Ok(self.matching(filter).len() as i64)
    }

    async fn create_economic_activity(&self, _tenant: &TenantId, activity: &EconomicActivity) -> Result<(), DatabaseError> {
        self.rows.lock().unwrap().push(activity.clone());
        Ok(())
    }
}

/// Join rows: `rows` is what list returns, inserts and deletes are recorded
pub struct FakeJoinRows<R> {
    rows: Mutex<Vec<R>>,
    links: Mutex<HashSet<(String, String)>>,
    inserted: Mutex<Vec<NewJoinRow>>,
    deleted: Mutex<Vec<String>>,
    missing: Mutex<HashSet<String>>,
    no_rows: AtomicBool,
}

impl<R> Default for FakeJoinRows<R> {
    fn default() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            links: Mutex::new(HashSet::new()),
            inserted: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            missing: Mutex::new(HashSet::new()),
            no_rows: AtomicBool::new(false),
        }
    }
}

impl<R: Clone> FakeJoinRows<R> {
    pub fn set_rows(&self, rows: Vec<R>) {
        *self.rows.lock().unwrap() = rows;
    }

    pub fn link(&self, parent_id: &str, child_id: &str) {
        self.links
            .lock()
            .unwrap()
            .insert((parent_id.to_string(), child_id.to_string()));
    }

    pub fn inserted(&self) -> Vec<NewJoinRow> {
        self.inserted.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    /// Batch deletes find no live row for `id`, as when it was deleted concurrently
    pub fn vanish(&self, id: &str) {
        self.missing.lock().unwrap().insert(id.to_string());
    }

    /// Updates and deletes report zero affected rows from now on
    pub fn fail_writes_with_no_rows(&self) {
        self.no_rows.store(true, Ordering::SeqCst);
    }

    fn check_rows(&self, function: &'static str) -> Result<(), DatabaseError> {
        if self.no_rows.load(Ordering::SeqCst) {
            Err(DatabaseError::NoRowsAffected { function })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl<R: Clone + Send + Sync + 'static> JoinRowRepository<R> for FakeJoinRows<R> {
    async fn list(&self, _tenant: &TenantId, _parent_id: &str, pagination: &Pagination) -> Result<Vec<R>, DatabaseError> {
        Ok(page_of(&self.rows.lock().unwrap(), pagination))
    }

    async fn total(&self, _tenant: &TenantId, parent_id: &str) -> Result<i64, DatabaseError> {
        let inserted = self
            .inserted
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.parent_id == parent_id)
            .count();
        Ok(inserted as i64)
    }

    async fn has(&self, _tenant: &TenantId, parent_id: &str, child_id: &str) -> Result<bool, DatabaseError> {
        let key = (parent_id.to_string(), child_id.to_string());
        let linked = self.links.lock().unwrap().contains(&key);
        let inserted = self
            .inserted
            .lock()
            .unwrap()
            .iter()
            .any(|r| r.parent_id == parent_id && r.child_id == child_id);
        Ok(linked || inserted)
    }

    async fn create(&self, _tenant: &TenantId, row: &NewJoinRow) -> Result<(), DatabaseError> {
        self.inserted.lock().unwrap().push(row.clone());
        Ok(())
    }

    async fn create_batch(&self, _tenant: &TenantId, rows: &[NewJoinRow]) -> Result<(), DatabaseError> {
        self.inserted.lock().unwrap().extend_from_slice(rows);
        Ok(())
    }

    async fn update_enable(
        &self,
        _tenant: &TenantId,
        _parent_id: &str,
        _id: &str,
        _enable: bool,
        _at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        self.check_rows("update_enable")
    }

    async fn delete(&self, _tenant: &TenantId, _parent_id: &str, id: &str, _at: DateTime<Utc>) -> Result<(), DatabaseError> {
        self.check_rows("delete")?;
        self.deleted.lock().unwrap().push(id.to_string());
        Ok(())
    }

    async fn delete_batch(
        &self,
        _tenant: &TenantId,
        _parent_id: &str,
        ids: &[String],
        _at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        self.check_rows("delete_batch")?;
        let missing = self.missing.lock().unwrap();
        if let Some(id) = ids.iter().find(|id| missing.contains(id.as_str())) {
            return Err(DatabaseError::RowMissing {
                function: "delete_batch",
                id: id.clone(),
            });
        }
        self.deleted.lock().unwrap().extend_from_slice(ids);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeUsers {
    credentials: Mutex<Vec<UserCredentials>>,
    persons: Mutex<HashMap<(String, String), String>>,
    created: Mutex<Vec<NewUser>>,
    updated: Mutex<Vec<UserUpdate>>,
    deleted: Mutex<Vec<String>>,
    menu_rows: Mutex<Vec<MenuRow>>,
}

impl FakeUsers {
    pub fn add_credentials(&self, id: &str, username: &str, password_hash: &str) {
        self.credentials.lock().unwrap().push(UserCredentials {
            id: id.to_string(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
        });
    }

    pub fn add_person(&self, type_document_id: &str, document: &str, id: &str) {
        self.persons
            .lock()
            .unwrap()
            .insert((type_document_id.to_string(), document.to_string()), id.to_string());
    }

    pub fn set_menu_rows(&self, rows: Vec<MenuRow>) {
        *self.menu_rows.lock().unwrap() = rows;
    }

    pub fn created(&self) -> Vec<NewUser> {
        self.created.lock().unwrap().clone()
    }

    pub fn updated(&self) -> Vec<UserUpdate> {
        self.updated.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    fn to_multiple(user: &NewUser) -> UserMultiple {
        UserMultiple {
            user: User {
                id: user.id.clone(),
                username: user.username.clone(),
                created_at: user.created_at,
                user_type: UserType {
                    id: user.user_type_id.clone(),
                    description: String::new(),
                    code: String::new(),
                },
            },
            roles: user
                .roles
                .iter()
                .map(|link| Role {
                    id: Some(link.role_id.clone()),
                    name: None,
                    description: None,
                    enable: Some(true),
                    created_at: None,
                    user_role: UserRole {
                        id: Some(link.id.clone()),
                        enable: Some(true),
                        created_at: Some(user.created_at),
                    },
                })
                .collect(),
        }
    }

    fn matching(&self, filter: &UserFilter) -> Vec<UserMultiple> {
        self.created
            .lock()
            .unwrap()
            .iter()
            .filter(|u| filter.username.as_ref().map_or(true, |n| u.username.contains(n.as_str())))
            .filter(|u| filter.user_type_id.as_ref().map_or(true, |t| &u.user_type_id == t))
            .map(Self::to_multiple)
            .collect()
    }
}

#[async_trait]
impl UserRepository for FakeUsers {
    async fn get_users(
        &self,
        _tenant: &TenantId,
        filter: &UserFilter,
        pagination: &Pagination,
    ) -> Result<Vec<UserMultiple>, DatabaseError> {
        Ok(page_of(&self.matching(filter), pagination))
    }

    async fn get_total_users(&self, _tenant: &TenantId, filter: &UserFilter) -> Result<i64, DatabaseError> {
        Ok(self.matching(filter).len() as i64)
    }

    async fn get_user(&self, _tenant: &TenantId, id: &str) -> Result<Option<UserMultiple>, DatabaseError> {
        Ok(self.created.lock().unwrap().iter().find(|u| u.id == id).map(Self::to_multiple))
    }

    async fn get_credentials(&self, _tenant: &TenantId, username: &str) -> Result<Option<UserCredentials>, DatabaseError> {
        Ok(self
            .credentials
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.username == username)
            .cloned())
    }

    async fn username_taken(
        &self,
        _tenant: &TenantId,
        username: &str,
        except_id: Option<&str>,
    ) -> Result<bool, DatabaseError> {
        Ok(self
            .created
            .lock()
            .unwrap()
            .iter()
            .any(|u| u.username == username && Some(u.id.as_str()) != except_id))
    }

    async fn find_person_by_document(
        &self,
        _tenant: &TenantId,
        type_document_id: &str,
        document: &str,
    ) -> Result<Option<String>, DatabaseError> {
        let key = (type_document_id.to_string(), document.to_string());
        Ok(self.persons.lock().unwrap().get(&key).cloned())
    }

    async fn create_user(&self, _tenant: &TenantId, user: &NewUser) -> Result<(), DatabaseError> {
        self.created.lock().unwrap().push(user.clone());
        Ok(())
    }

    async fn update_user(&self, _tenant: &TenantId, user: &UserUpdate) -> Result<(), DatabaseError> {
        let mut created = self.created.lock().unwrap();
        let Some(existing) = created.iter_mut().find(|u| u.id == user.id) else {
            return Err(DatabaseError::NoRowsAffected { function: "update_user" });
        };
        existing.username = user.username.clone();
        existing.user_type_id = user.user_type_id.clone();
        if let Some(roles) = &user.roles {
            existing.roles = roles.clone();
        }
        self.updated.lock().unwrap().push(user.clone());
        Ok(())
    }

    async fn delete_user(&self, _tenant: &TenantId, id: &str, _at: DateTime<Utc>) -> Result<(), DatabaseError> {
        self.deleted.lock().unwrap().push(id.to_string());
        Ok(())
    }

    async fn update_password(
        &self,
        _tenant: &TenantId,
        _id: &str,
        _password_hash: &str,
        _at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        Ok(())
    }

    async fn get_me(&self, _tenant: &TenantId, user_id: &str) -> Result<Option<UserMe>, DatabaseError> {
        Ok(self.created.lock().unwrap().iter().find(|u| u.id == user_id).map(|u| UserMe {
            id: u.id.clone(),
            username: u.username.clone(),
            created_at: u.created_at,
            person: None,
            roles: Vec::new(),
            stores: Vec::new(),
            merchants: Vec::new(),
        }))
    }

    async fn get_stores_by_user(&self, _tenant: &TenantId, _user_id: &str) -> Result<Vec<StoreByUser>, DatabaseError> {
        Ok(vec![StoreByUser {
            id: "store-1".into(),
            name: "Central".into(),
            shortname: Some("CEN".into()),
            merchant_id: "merchant-1".into(),
        }])
    }

    async fn get_merchants_by_user(&self, _tenant: &TenantId, _user_id: &str) -> Result<Vec<MerchantByUser>, DatabaseError> {
        Ok(vec![MerchantByUser {
            id: "merchant-1".into(),
            name: "Acme Retail".into(),
            description: None,
            document: Some("20123456789".into()),
        }])
    }

    async fn get_menu_rows(&self, _tenant: &TenantId, _user_id: &str) -> Result<Vec<MenuRow>, DatabaseError> {
        Ok(self.menu_rows.lock().unwrap().clone())
    }
}

/// Application state wired to in-memory fakes
pub struct TestApp {
    pub config: AppConfig,
    pub state: AppState,
    pub provider: Arc<FakeProvider>,
    pub exists: Arc<FakeRecordExists>,
    pub users: Arc<FakeUsers>,
    pub role_policies: Arc<FakeJoinRows<RolePolicy>>,
    pub policy_permissions: Arc<FakeJoinRows<PolicyPermission>>,
    pub economic_activities: Arc<FakeEconomicActivities>,
}

impl TestApp {
    pub fn new() -> Self {
        let config = AppConfig::for_tests();
        let keys = JwtKeys::from_config(&config.security).unwrap();
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::default());
        let timeout = config.use_case.context_timeout();

        let provider = Arc::new(FakeProvider::default());
        let exists = Arc::new(FakeRecordExists::default());
        let users = Arc::new(FakeUsers::default());
        let role_policies = Arc::new(FakeJoinRows::<RolePolicy>::default());
        let policy_permissions = Arc::new(FakeJoinRows::<PolicyPermission>::default());
        let economic_activities = Arc::new(FakeEconomicActivities::default());

        let state = AppState {
            provider: provider.clone(),
            auth: Arc::new(AuthService::new(users.clone(), keys.clone(), clock.clone(), timeout)),
            users: Arc::new(UserService::new(
                users.clone(),
                exists.clone(),
                clock.clone(),
                timeout,
                config.security.password_hash_cost,
            )),
            role_policies: Arc::new(RolePolicyService::new(
                role_policies.clone(),
                exists.clone(),
                clock.clone(),
                timeout,
            )),
            policy_permissions: Arc::new(PolicyPermissionService::new(
                policy_permissions.clone(),
                exists.clone(),
                clock.clone(),
                timeout,
            )),
            economic_activities: Arc::new(EconomicActivityService::new(
                economic_activities.clone(),
                exists.clone(),
                clock,
                timeout,
            )),
            keys,
        };

        Self {
            config,
            state,
            provider,
            exists,
            users,
            role_policies,
            policy_permissions,
            economic_activities,
        }
    }

    /// Bearer token for `user_id` on `tenant`, valid from now
    pub fn token(&self, user_id: &str, tenant: &str) -> String {
        let claims = Claims::new(user_id, "tester", tenant, Utc::now(), self.state.keys.ttl());
        self.state.keys.generate(&claims).unwrap()
    }
}
