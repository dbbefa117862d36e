pub mod auth;
pub mod clock;
pub mod economic_activities;
pub mod join_rows;
pub mod menu;
pub mod users;

use std::future::Future;
use std::time::Duration;
use tokio::time::error::Elapsed;

use crate::pagination::{Page, Pagination, PaginationResults};

pub use auth::{AuthError, AuthService, LoginRequest, LoginResponse};
pub use clock::{Clock, SystemClock};
pub use economic_activities::{CreateEconomicActivity, EconomicActivityError, EconomicActivityService};
pub use join_rows::{
    JoinRowKind, JoinRowService, PolicyPermissionError, PolicyPermissionService, PolicyPermissions, RolePolicies,
    RolePolicyError, RolePolicyService,
};
pub use users::{ChangePassword, CreateUser, PersonInput, UpdateUser, UserError, UserService};

/// Runs a use case under its context timeout
pub async fn bounded<T, E, F>(limit: Duration, fut: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: From<Elapsed>,
{
    tokio::time::timeout(limit, fut).await?
}

/// Runs the page and total queries concurrently and builds the page envelope.
/// Either failure fails the whole call.
pub async fn fetch_page<T, E, L, C>(pagination: &Pagination, list: L, total: C) -> Result<Page<T>, E>
where
    L: Future<Output = Result<Vec<T>, E>>,
    C: Future<Output = Result<i64, E>>,
{
    let (data, total) = tokio::try_join!(list, total)?;
    Ok(Page {
        data,
        pagination: PaginationResults::from_params(pagination, total),
    })
}
