use async_trait::async_trait;
use axum::http::StatusCode;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::error::{ErrorLayer, SmartError};

/// Errors raised by the repository layer
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Invalid tenant identifier: {0}")]
    InvalidTenant(String),

    #[error("Invalid SQL identifier: {0}")]
    InvalidIdentifier(String),

    #[error("{function} failed: {source}")]
    Query {
        function: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("{function} affected no rows")]
    NoRowsAffected { function: &'static str },

    /// A batch write found no live row for `id`
    #[error("{function} found no live row {id}")]
    RowMissing { function: &'static str, id: String },
}

impl DatabaseError {
    /// Tags a driver error with the repository function that issued it
    pub fn query(function: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |source| DatabaseError::Query { function, source }
    }
}

impl From<DatabaseError> for SmartError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::InvalidTenant(tenant) => SmartError::new(
                "ERR_INVALID_TENANT",
                "The tenant identifier is not valid",
                StatusCode::BAD_REQUEST,
                ErrorLayer::Interface,
            )
            .with_raw(tenant),
            DatabaseError::InvalidIdentifier(ident) => SmartError::unknown().with_raw(ident),
            DatabaseError::Query { function, source } => {
                SmartError::unknown().with_function(function).with_raw(source)
            }
            DatabaseError::NoRowsAffected { function } => SmartError::unknown()
                .with_function(function)
                .with_raw("no rows affected"),
            DatabaseError::RowMissing { function, id } => SmartError::unknown()
                .with_function(function)
                .with_raw(format!("no live row {id}")),
        }
    }
}

/// Tenant selected by the `x-tenant-id` header
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TenantId(String);

impl TenantId {
    pub const MAX_LEN: usize = 64;

    pub fn parse(value: &str) -> Result<Self, DatabaseError> {
        let value = value.trim();
        let valid = !value.is_empty()
            && value.len() <= Self::MAX_LEN
            && value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if valid {
            Ok(Self(value.to_string()))
        } else {
            Err(DatabaseError::InvalidTenant(value.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolves a tenant to its database handle
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    async fn pool(&self, tenant: &TenantId) -> Result<MySqlPool, DatabaseError>;

    async fn health_check(&self) -> Result<(), DatabaseError>;
}

/// Lazily built MySQL pools, one per tenant database
pub struct DatabaseManager {
    config: DatabaseConfig,
    pools: RwLock<HashMap<String, MySqlPool>>,
}

impl DatabaseManager {
    pub fn new(config: DatabaseConfig) -> Self {
        Self {
            config,
            pools: RwLock::new(HashMap::new()),
        }
    }

    fn database_name(&self, tenant: &TenantId) -> String {
        format!("{}_{}", self.config.name, tenant)
    }

    fn connect_options(&self, database: &str) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&self.config.host)
            .port(self.config.port)
            .username(&self.config.user)
            .password(&self.config.password)
            .database(database)
    }

    /// Get existing pool or create a new one lazily
    async fn get_pool(&self, database: &str) -> MySqlPool {
        // Fast path: try read lock
        {
            let pools = self.pools.read().await;
            if let Some(pool) = pools.get(database) {
                return pool.clone();
            }
        }

        let mut pools = self.pools.write().await;
        if let Some(pool) = pools.get(database) {
            return pool.clone();
        }

        let pool = MySqlPoolOptions::new()
            .max_connections(self.config.max_connections)
            .acquire_timeout(Duration::from_secs(self.config.connection_timeout))
            .connect_lazy_with(self.connect_options(database));
        pools.insert(database.to_string(), pool.clone());

        info!("Created database pool for: {}", database);
        pool
    }

    /// Close and remove all pools (e.g., on shutdown)
    pub async fn close_all(&self) {
        let mut pools = self.pools.write().await;
        for (name, pool) in pools.drain() {
            pool.close().await;
            info!("Closed database pool: {}", name);
        }
    }
}

#[async_trait]
impl ConnectionProvider for DatabaseManager {
    async fn pool(&self, tenant: &TenantId) -> Result<MySqlPool, DatabaseError> {
        Ok(self.get_pool(&self.database_name(tenant)).await)
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        let pool = self.get_pool(&self.config.name).await;
        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .map_err(DatabaseError::query("health_check"))?;
        Ok(())
    }
}

/// SQL identifiers are never bound as parameters, so only plain names pass
pub fn is_valid_identifier(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}
