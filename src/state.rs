use std::sync::Arc;

use crate::auth::{JwtError, JwtKeys};
use crate::config::AppConfig;
use crate::database::models::{PolicyPermission, RolePolicy};
use crate::database::repositories::{
    MySqlEconomicActivityRepository, MySqlJoinRowRepository, MySqlUserRepository, POLICY_PERMISSIONS, ROLE_POLICIES,
};
use crate::database::{ConnectionProvider, DatabaseError, MySqlRecordExists, RecordExists};
use crate::services::{
    AuthService, Clock, EconomicActivityService, PolicyPermissionService, RolePolicyService, SystemClock, UserService,
};

/// Shared application state available to all handlers via `State<AppState>`.
///
/// Cheap to clone: every service sits behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<dyn ConnectionProvider>,
    pub keys: JwtKeys,
    pub auth: Arc<AuthService>,
    pub users: Arc<UserService>,
    pub role_policies: Arc<RolePolicyService>,
    pub policy_permissions: Arc<PolicyPermissionService>,
    pub economic_activities: Arc<EconomicActivityService>,
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error(transparent)]
    Jwt(#[from] JwtError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl AppState {
    /// Wires clock, MySQL repositories and use cases over one connection provider
    pub fn new(config: &AppConfig, provider: Arc<dyn ConnectionProvider>) -> Result<Self, StateError> {
        let keys = JwtKeys::from_config(&config.security)?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let exists: Arc<dyn RecordExists> = Arc::new(MySqlRecordExists::new(provider.clone()));
        let timeout = config.use_case.context_timeout();

        let user_repo = Arc::new(MySqlUserRepository::new(provider.clone()));
        let role_policy_repo = Arc::new(MySqlJoinRowRepository::<RolePolicy>::new(provider.clone(), ROLE_POLICIES)?);
        let policy_permission_repo = Arc::new(MySqlJoinRowRepository::<PolicyPermission>::new(
            provider.clone(),
            POLICY_PERMISSIONS,
        )?);
        let activity_repo = Arc::new(MySqlEconomicActivityRepository::new(provider.clone()));

        Ok(Self {
            auth: Arc::new(AuthService::new(user_repo.clone(), keys.clone(), clock.clone(), timeout)),
            users: Arc::new(UserService::new(
                user_repo,
                exists.clone(),
                clock.clone(),
                timeout,
                config.security.password_hash_cost,
            )),
            role_policies: Arc::new(RolePolicyService::new(role_policy_repo, exists.clone(), clock.clone(), timeout)),
            policy_permissions: Arc::new(PolicyPermissionService::new(
                policy_permission_repo,
                exists.clone(),
                clock.clone(),
                timeout,
            )),
            economic_activities: Arc::new(EconomicActivityService::new(activity_repo, exists, clock, timeout)),
            provider,
            keys,
        })
    }
}
