//! Router builder shared by the binary and the router tests.

use std::any::Any;
use std::time::Duration;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, Method};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::Router;
use clap::ValueEnum;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::config::ServerConfig;
use crate::error::SmartError;
use crate::handlers::protected::{economic_activities, join_rows, policy_permissions, role_policies, users};
use crate::handlers::public;
use crate::middleware::{jwt_auth_middleware, tenant_middleware, TENANT_HEADER};
use crate::services::{PolicyPermissions, RolePolicies};
use crate::state::AppState;

/// Business modules a server process can mount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum Service {
    Users,
    RolePolicies,
    PolicyPermissions,
    EconomicActivities,
}

impl Service {
    pub const ALL: [Service; 4] = [
        Service::Users,
        Service::RolePolicies,
        Service::PolicyPermissions,
        Service::EconomicActivities,
    ];

    fn routes(self) -> Router<AppState> {
        match self {
            Service::Users => users_routes(),
            Service::RolePolicies => role_policy_routes(),
            Service::PolicyPermissions => policy_permission_routes(),
            Service::EconomicActivities => economic_activity_routes(),
        }
    }
}

/// Build the application router for the given services.
///
/// Middleware, outermost first: CORS, tracing, panic recovery. Core routes
/// additionally run JWT authentication and then tenant resolution.
pub fn app(state: AppState, services: &[Service], server: &ServerConfig) -> Router {
    let mut router = Router::new().route("/health", get(public::health::health));

    if !services.is_empty() {
        let core = services
            .iter()
            .fold(Router::new(), |core, service| core.merge(service.routes()))
            .route_layer(from_fn(tenant_middleware))
            .route_layer(from_fn_with_state(state.clone(), jwt_auth_middleware));
        router = router.nest("/api/v1/core", core);
    }

    if services.contains(&Service::Users) {
        let auth = Router::new()
            .route("/login", post(public::auth::login))
            .route_layer(from_fn(tenant_middleware));
        router = router.nest("/api/v1/auth", auth);
    }

    router
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(server))
        .with_state(state)
}

fn users_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(users::list).post(users::create))
        .route("/users/me", get(users::me))
        .route("/users/menu", get(users::menu))
        .route(
            "/users/:id",
            get(users::show).put(users::update).delete(users::delete),
        )
        .route("/users/:id/password", put(users::change_password))
}

fn role_policy_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/roles/:role_id/policies",
            get(join_rows::list::<RolePolicies>).post(role_policies::create),
        )
        .route(
            "/roles/:role_id/policies/batch",
            post(role_policies::create_batch).delete(join_rows::delete_batch::<RolePolicies>),
        )
        .route(
            "/roles/:role_id/policies/:id",
            put(join_rows::update::<RolePolicies>).delete(join_rows::delete::<RolePolicies>),
        )
}

fn policy_permission_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/policies/:policy_id/permissions",
            get(join_rows::list::<PolicyPermissions>).post(policy_permissions::create),
        )
        .route(
            "/policies/:policy_id/permissions/batch",
            post(policy_permissions::create_batch).delete(join_rows::delete_batch::<PolicyPermissions>),
        )
        .route(
            "/policies/:policy_id/permissions/:id",
            put(join_rows::update::<PolicyPermissions>).delete(join_rows::delete::<PolicyPermissions>),
        )
}

fn economic_activity_routes() -> Router<AppState> {
    Router::new().route(
        "/economic_activities",
        get(economic_activities::list).post(economic_activities::create),
    )
}

/// Build the CORS layer from server configuration; unparsable origins are skipped
pub fn build_cors_layer(server: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = server
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring invalid CORS origin '{}': {}", origin, e);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION, HeaderName::from_static(TENANT_HEADER)])
        .max_age(Duration::from_secs(3600))
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };

    SmartError::unknown()
        .with_function("handler")
        .with_raw(detail)
        .into_response()
}
