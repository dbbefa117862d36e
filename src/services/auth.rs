use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::{self, JoinError};
use tokio::time::error::Elapsed;
use tracing::{info, warn};
use validator::Validate;

use super::{bounded, Clock};
use crate::auth::{Claims, JwtError, JwtKeys};
use crate::database::repositories::UserRepository;
use crate::database::{DatabaseError, TenantId};
use crate::error::{ErrorLayer, SmartError};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid username or password")]
    InvalidCredentials,

    #[error(transparent)]
    Token(#[from] JwtError),

    #[error("password check task failed: {0}")]
    VerifyTask(#[from] JoinError),

    #[error("login timed out")]
    Timeout(#[from] Elapsed),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<AuthError> for SmartError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => SmartError::new(
                "ERR_INVALID_CREDENTIALS",
                "Invalid username or password",
                StatusCode::UNAUTHORIZED,
                ErrorLayer::Domain,
            ),
            AuthError::Token(e) => SmartError::unknown().with_function("login").with_raw(e),
            AuthError::VerifyTask(e) => SmartError::unknown().with_function("verify_password").with_raw(e),
            AuthError::Timeout(_) => SmartError::timeout("login"),
            AuthError::Database(e) => e.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "username is required"))]
    pub username: String,

    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginUser {
    pub id: String,
    pub username: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: &'static str,
    /// Seconds until the token expires
    pub expires_in: i64,
    pub user: LoginUser,
}

pub struct AuthService {
    users: Arc<dyn UserRepository>,
    keys: JwtKeys,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserRepository>, keys: JwtKeys, clock: Arc<dyn Clock>, timeout: Duration) -> Self {
        Self {
            users,
            keys,
            clock,
            timeout,
        }
    }

    pub async fn login(&self, tenant: &TenantId, request: LoginRequest) -> Result<LoginResponse, AuthError> {
        bounded(self.timeout, async {
            let Some(credentials) = self.users.get_credentials(tenant, &request.username).await? else {
                warn!(%tenant, username = %request.username, "Login for unknown user");
                return Err(AuthError::InvalidCredentials);
            };

            let (password, hash) = (request.password, credentials.password_hash.clone());
            let valid = task::spawn_blocking(move || bcrypt::verify(password, &hash))
                .await?
                .unwrap_or_else(|e| {
                    warn!(%tenant, username = %credentials.username, "Stored password hash is unusable: {}", e);
                    false
                });
            if !valid {
                warn!(%tenant, username = %credentials.username, "Login with wrong password");
                return Err(AuthError::InvalidCredentials);
            }

            let claims = Claims::new(
                &credentials.id,
                &credentials.username,
                tenant.as_str(),
                self.clock.now(),
                self.keys.ttl(),
            );
            let token = self.keys.generate(&claims)?;

            info!(%tenant, user_id = %credentials.id, "User logged in");
            Ok(LoginResponse {
                token,
                token_type: "Bearer",
                expires_in: claims.exp - claims.iat,
                user: LoginUser {
                    id: credentials.id,
                    username: credentials.username,
                },
            })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::services::SystemClock;
    use crate::testing::{tenant, FakeUsers};

    fn service(users: Arc<FakeUsers>) -> AuthService {
        let keys = JwtKeys::from_config(&AppConfig::for_tests().security).unwrap();
        // Wall clock: tokens issued at the fixed test instant would already be expired
        AuthService::new(users, keys, Arc::new(SystemClock), Duration::from_secs(5))
    }

    fn request(password: &str) -> LoginRequest {
        LoginRequest {
            username: "ana".into(),
            password: password.into(),
        }
    }

    #[tokio::test]
    async fn issues_a_token_for_valid_credentials() {
        let users = Arc::new(FakeUsers::default());
        users.add_credentials("u-1", "ana", &bcrypt::hash("s3cret-pass", 4).unwrap());
        let service = service(users);

        let response = service.login(&tenant(), request("s3cret-pass")).await.unwrap();

        assert_eq!(response.token_type, "Bearer");
        assert_eq!(response.user.id, "u-1");
        let keys = JwtKeys::from_config(&AppConfig::for_tests().security).unwrap();
        let claims = keys.validate(&response.token).unwrap();
        assert_eq!(claims.tenant_id, tenant().as_str());
        assert_eq!(response.expires_in, keys.ttl().num_seconds());
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_user_look_the_same() {
        let users = Arc::new(FakeUsers::default());
        users.add_credentials("u-1", "ana", &bcrypt::hash("s3cret-pass", 4).unwrap());
        let service = service(users);

        let wrong = service.login(&tenant(), request("nope")).await.unwrap_err();
        let unknown = service
            .login(
                &tenant(),
                LoginRequest {
                    username: "bob".into(),
                    password: "nope".into(),
                },
            )
            .await
            .unwrap_err();

        let wrong: SmartError = wrong.into();
        let unknown: SmartError = unknown.into();
        assert_eq!(wrong.code, "ERR_INVALID_CREDENTIALS");
        assert_eq!(unknown.code, wrong.code);
        assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
    }
}
