use axum::http::StatusCode;
use futures::future::try_join_all;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::error::Elapsed;
use tracing::{debug, info};
use uuid::Uuid;

use super::{bounded, fetch_page, Clock};
use crate::database::models::{NewJoinRow, PolicyPermission, RolePolicy};
use crate::database::repositories::{JoinRowRepository, JoinTable, POLICY_PERMISSIONS, ROLE_POLICIES};
use crate::database::{DatabaseError, ExistsCheck, RecordExists, TenantId};
use crate::error::{ErrorLayer, FieldError, SmartError};
use crate::pagination::{Page, Pagination};

/// Describes one many-to-many association: its tables, row type and domain errors
pub trait JoinRowKind: Send + Sync + 'static {
    type Row: Serialize + Send + Sync + 'static;
    type Error: From<DatabaseError> + From<Elapsed> + Send + 'static;

    const TABLE: JoinTable;
    const PARENT_TABLE: &'static str;
    const CHILD_TABLE: &'static str;
    /// Request field holding child ids in batch bodies
    const CHILD_IDS_FIELD: &'static str;

    fn parent_not_found(parent_id: &str) -> Self::Error;
    fn child_not_found(child_id: &str) -> Self::Error;
    fn already_linked(parent_id: &str, child_id: &str) -> Self::Error;
    fn duplicated(field: &'static str, id: &str) -> Self::Error;
    fn not_found(id: &str) -> Self::Error;
    fn has_been_deleted(id: &str) -> Self::Error;
}

pub struct RolePolicies;

#[derive(Debug, Error)]
pub enum RolePolicyError {
    #[error("role {0} not found")]
    RoleNotFound(String),

    #[error("policy {0} not found")]
    PolicyNotFound(String),

    #[error("role {role_id} already has policy {policy_id}")]
    AlreadyHasThePolicy { role_id: String, policy_id: String },

    #[error("{field} repeats id {id}")]
    Duplicated { field: &'static str, id: String },

    #[error("role policy {0} not found")]
    NotFound(String),

    #[error("role policy {0} has been deleted")]
    IdHasBeenDeleted(String),

    #[error("role policies use case timed out")]
    Timeout(#[from] Elapsed),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl JoinRowKind for RolePolicies {
    type Row = RolePolicy;
    type Error = RolePolicyError;

    const TABLE: JoinTable = ROLE_POLICIES;
    const PARENT_TABLE: &'static str = "core_roles";
    const CHILD_TABLE: &'static str = "core_policies";
    const CHILD_IDS_FIELD: &'static str = "policy_ids";

    fn parent_not_found(parent_id: &str) -> RolePolicyError {
        RolePolicyError::RoleNotFound(parent_id.to_string())
    }

    fn child_not_found(child_id: &str) -> RolePolicyError {
        RolePolicyError::PolicyNotFound(child_id.to_string())
    }

    fn already_linked(parent_id: &str, child_id: &str) -> RolePolicyError {
        RolePolicyError::AlreadyHasThePolicy {
            role_id: parent_id.to_string(),
            policy_id: child_id.to_string(),
        }
    }

    fn duplicated(field: &'static str, id: &str) -> RolePolicyError {
        RolePolicyError::Duplicated { field, id: id.to_string() }
    }

    fn not_found(id: &str) -> RolePolicyError {
        RolePolicyError::NotFound(id.to_string())
    }

    fn has_been_deleted(id: &str) -> RolePolicyError {
        RolePolicyError::IdHasBeenDeleted(id.to_string())
    }
}

impl From<RolePolicyError> for SmartError {
    fn from(err: RolePolicyError) -> Self {
        match err {
            RolePolicyError::RoleNotFound(id) => not_found("ERR_ROLE_NOT_FOUND", "The role does not exist", id),
            RolePolicyError::PolicyNotFound(id) => {
                not_found("ERR_POLICY_NOT_FOUND", "The policy does not exist", id)
            }
            RolePolicyError::AlreadyHasThePolicy { role_id, policy_id } => SmartError::new(
                "ERR_ROLE_ALREADY_HAS_THE_POLICY",
                "The role already has this policy",
                StatusCode::CONFLICT,
                ErrorLayer::Domain,
            )
            .with_raw(format!("{role_id}/{policy_id}")),
            RolePolicyError::Duplicated { field, id } => duplicated(field, id),
            RolePolicyError::NotFound(id) => {
                not_found("ERR_ROLE_POLICY_NOT_FOUND", "The role policy does not exist", id)
            }
            RolePolicyError::IdHasBeenDeleted(id) => not_found(
                "ERR_ROLE_POLICY_ID_HAS_BEEN_DELETED",
                "The role policy does not exist or has been deleted",
                id,
            ),
            RolePolicyError::Timeout(_) => SmartError::timeout("role_policies"),
            RolePolicyError::Database(e) => e.into(),
        }
    }
}

pub struct PolicyPermissions;

#[derive(Debug, Error)]
pub enum PolicyPermissionError {
    #[error("policy {0} not found")]
    PolicyNotFound(String),

    #[error("permission {0} not found")]
    PermissionNotFound(String),

    #[error("policy {policy_id} already has permission {permission_id}")]
    AlreadyHasThePermission { policy_id: String, permission_id: String },

    #[error("{field} repeats id {id}")]
    Duplicated { field: &'static str, id: String },

    #[error("policy permission {0} not found")]
    NotFound(String),

    #[error("policy permission {0} has been deleted")]
    IdHasBeenDeleted(String),

    #[error("policy permissions use case timed out")]
    Timeout(#[from] Elapsed),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl JoinRowKind for PolicyPermissions {
    type Row = PolicyPermission;
    type Error = PolicyPermissionError;

    const TABLE: JoinTable = POLICY_PERMISSIONS;
    const PARENT_TABLE: &'static str = "core_policies";
    const CHILD_TABLE: &'static str = "core_permissions";
    const CHILD_IDS_FIELD: &'static str = "permission_ids";

    fn parent_not_found(parent_id: &str) -> PolicyPermissionError {
        PolicyPermissionError::PolicyNotFound(parent_id.to_string())
    }

    fn child_not_found(child_id: &str) -> PolicyPermissionError {
        PolicyPermissionError::PermissionNotFound(child_id.to_string())
    }

    fn already_linked(parent_id: &str, child_id: &str) -> PolicyPermissionError {
        PolicyPermissionError::AlreadyHasThePermission {
            policy_id: parent_id.to_string(),
            permission_id: child_id.to_string(),
        }
    }

    fn duplicated(field: &'static str, id: &str) -> PolicyPermissionError {
        PolicyPermissionError::Duplicated { field, id: id.to_string() }
    }

    fn not_found(id: &str) -> PolicyPermissionError {
        PolicyPermissionError::NotFound(id.to_string())
    }

    fn has_been_deleted(id: &str) -> PolicyPermissionError {
        PolicyPermissionError::IdHasBeenDeleted(id.to_string())
    }
}

impl From<PolicyPermissionError> for SmartError {
    fn from(err: PolicyPermissionError) -> Self {
        match err {
            PolicyPermissionError::PolicyNotFound(id) => {
                not_found("ERR_POLICY_NOT_FOUND", "The policy does not exist", id)
            }
            PolicyPermissionError::PermissionNotFound(id) => {
                not_found("ERR_PERMISSION_NOT_FOUND", "The permission does not exist", id)
            }
            PolicyPermissionError::AlreadyHasThePermission { policy_id, permission_id } => SmartError::new(
                "ERR_POLICY_ALREADY_HAS_THE_PERMISSION",
                "The policy already has this permission",
                StatusCode::CONFLICT,
                ErrorLayer::Domain,
            )
            .with_raw(format!("{policy_id}/{permission_id}")),
            PolicyPermissionError::Duplicated { field, id } => duplicated(field, id),
            PolicyPermissionError::NotFound(id) => {
                not_found("ERR_POLICY_PERMISSION_NOT_FOUND", "The policy permission does not exist", id)
            }
            PolicyPermissionError::IdHasBeenDeleted(id) => not_found(
                "ERR_POLICY_PERMISSION_ID_HAS_BEEN_DELETED",
                "The policy permission does not exist or has been deleted",
                id,
            ),
            PolicyPermissionError::Timeout(_) => SmartError::timeout("policy_permissions"),
            PolicyPermissionError::Database(e) => e.into(),
        }
    }
}

fn not_found(code: &'static str, message: &'static str, id: String) -> SmartError {
    SmartError::new(code, message, StatusCode::NOT_FOUND, ErrorLayer::Domain).with_raw(id)
}

fn duplicated(field: &'static str, id: String) -> SmartError {
    SmartError::validation(vec![FieldError::new(field, format!("id {id} is repeated"))])
}

pub type RolePolicyService = JoinRowService<RolePolicies>;
pub type PolicyPermissionService = JoinRowService<PolicyPermissions>;

/// Use cases shared by every join-row module
pub struct JoinRowService<K: JoinRowKind> {
    repo: Arc<dyn JoinRowRepository<K::Row>>,
    exists: Arc<dyn RecordExists>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl<K: JoinRowKind> JoinRowService<K> {
    pub fn new(
        repo: Arc<dyn JoinRowRepository<K::Row>>,
        exists: Arc<dyn RecordExists>,
        clock: Arc<dyn Clock>,
        timeout: Duration,
    ) -> Self {
        Self {
            repo,
            exists,
            clock,
            timeout,
        }
    }

    async fn ensure_active(
        &self,
        tenant: &TenantId,
        table: &'static str,
        id: &str,
        missing: fn(&str) -> K::Error,
    ) -> Result<(), K::Error> {
        if self.exists.record_exists(tenant, ExistsCheck::active_id(table, id)).await? {
            Ok(())
        } else {
            Err(missing(id))
        }
    }

    /// Child must exist and not be linked to the parent yet
    async fn ensure_linkable(&self, tenant: &TenantId, parent_id: &str, child_id: &str) -> Result<(), K::Error> {
        self.ensure_active(tenant, K::CHILD_TABLE, child_id, K::child_not_found).await?;
        if self.repo.has(tenant, parent_id, child_id).await? {
            return Err(K::already_linked(parent_id, child_id));
        }
        Ok(())
    }

    fn new_row(&self, parent_id: &str, child_id: &str, enable: bool) -> NewJoinRow {
        NewJoinRow {
            id: Uuid::new_v4().to_string(),
            parent_id: parent_id.to_string(),
            child_id: child_id.to_string(),
            enable,
            created_at: self.clock.now(),
        }
    }

    pub async fn list(
        &self,
        tenant: &TenantId,
        parent_id: &str,
        pagination: &Pagination,
    ) -> Result<Page<K::Row>, K::Error> {
        debug!(%tenant, table = K::TABLE.table, parent_id, "Listing join rows");
        bounded(self.timeout, async {
            fetch_page(
                pagination,
                self.repo.list(tenant, parent_id, pagination),
                self.repo.total(tenant, parent_id),
            )
            .await
            .map_err(K::Error::from)
        })
        .await
    }

    pub async fn create(
        &self,
        tenant: &TenantId,
        parent_id: &str,
        child_id: &str,
        enable: bool,
    ) -> Result<NewJoinRow, K::Error> {
        bounded(self.timeout, async {
            self.ensure_active(tenant, K::PARENT_TABLE, parent_id, K::parent_not_found).await?;
            self.ensure_linkable(tenant, parent_id, child_id).await?;

            let row = self.new_row(parent_id, child_id, enable);
            self.repo.create(tenant, &row).await?;

            info!(%tenant, table = K::TABLE.table, id = %row.id, parent_id, child_id, "Created join row");
            Ok(row)
        })
        .await
    }

    /// Validates every child concurrently, then inserts all rows in one transaction
    pub async fn create_batch(
        &self,
        tenant: &TenantId,
        parent_id: &str,
        child_ids: &[String],
        enable: bool,
    ) -> Result<Vec<NewJoinRow>, K::Error> {
        bounded(self.timeout, async {
            ensure_unique::<K>(K::CHILD_IDS_FIELD, child_ids)?;
            self.ensure_active(tenant, K::PARENT_TABLE, parent_id, K::parent_not_found).await?;
            try_join_all(
                child_ids
                    .iter()
                    .map(|child_id| self.ensure_linkable(tenant, parent_id, child_id)),
            )
            .await?;

            let rows: Vec<NewJoinRow> = child_ids
                .iter()
                .map(|child_id| self.new_row(parent_id, child_id, enable))
                .collect();
            self.repo.create_batch(tenant, &rows).await?;

            info!(%tenant, table = K::TABLE.table, parent_id, count = rows.len(), "Created join rows");
            Ok(rows)
        })
        .await
    }

    pub async fn update(&self, tenant: &TenantId, parent_id: &str, id: &str, enable: bool) -> Result<(), K::Error> {
        bounded(self.timeout, async {
            self.ensure_active(tenant, K::TABLE.table, id, K::not_found).await?;

            match self.repo.update_enable(tenant, parent_id, id, enable, self.clock.now()).await {
                Err(DatabaseError::NoRowsAffected { .. }) => return Err(K::not_found(id)),
                other => other?,
            }

            info!(%tenant, table = K::TABLE.table, id, enable, "Updated join row");
            Ok(())
        })
        .await
    }

    pub async fn delete(&self, tenant: &TenantId, parent_id: &str, id: &str) -> Result<(), K::Error> {
        bounded(self.timeout, async {
            self.ensure_active(tenant, K::TABLE.table, id, K::has_been_deleted).await?;

            match self.repo.delete(tenant, parent_id, id, self.clock.now()).await {
                Err(DatabaseError::NoRowsAffected { .. }) => return Err(K::has_been_deleted(id)),
                other => other?,
            }

            info!(%tenant, table = K::TABLE.table, id, "Deleted join row");
            Ok(())
        })
        .await
    }

    /// Checks every id first, then soft-deletes all rows in one transaction
    pub async fn delete_batch(&self, tenant: &TenantId, parent_id: &str, ids: &[String]) -> Result<(), K::Error> {
        bounded(self.timeout, async {
            ensure_unique::<K>("ids", ids)?;
            for id in ids {
                self.ensure_active(tenant, K::TABLE.table, id, K::has_been_deleted).await?;
            }

            match self.repo.delete_batch(tenant, parent_id, ids, self.clock.now()).await {
                Err(DatabaseError::RowMissing { id, .. }) => return Err(K::has_been_deleted(&id)),
                other => other?,
            }

            info!(%tenant, table = K::TABLE.table, parent_id, count = ids.len(), "Deleted join rows");
            Ok(())
        })
        .await
    }
}

fn ensure_unique<K: JoinRowKind>(field: &'static str, ids: &[String]) -> Result<(), K::Error> {
    let mut seen = HashSet::new();
    match ids.iter().find(|id| !seen.insert(id.as_str())) {
        Some(id) => Err(K::duplicated(field, id)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{tenant, FakeJoinRows, FakeRecordExists, FixedClock};

    struct Fixture {
        repo: Arc<FakeJoinRows<RolePolicy>>,
        exists: Arc<FakeRecordExists>,
        service: RolePolicyService,
    }

    fn fixture() -> Fixture {
        let repo = Arc::new(FakeJoinRows::default());
        let exists = Arc::new(FakeRecordExists::default());
        exists.insert("core_roles", "id", "role-1");
        exists.insert("core_policies", "id", "policy-1");
        exists.insert("core_policies", "id", "policy-2");
        let service = RolePolicyService::new(
            repo.clone(),
            exists.clone(),
            Arc::new(FixedClock::default()),
            Duration::from_secs(5),
        );
        Fixture { repo, exists, service }
    }

    #[tokio::test]
    async fn create_rejects_existing_pair_without_insert() {
        let f = fixture();
        f.repo.link("role-1", "policy-1");

        let err = f.service.create(&tenant(), "role-1", "policy-1", true).await.unwrap_err();

        assert!(matches!(err, RolePolicyError::AlreadyHasThePolicy { .. }));
        assert!(f.repo.inserted().is_empty());
        let smart: SmartError = err.into();
        assert_eq!(smart.code, "ERR_ROLE_ALREADY_HAS_THE_POLICY");
        assert_eq!(smart.status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn create_checks_parent_and_child() {
        let f = fixture();

        let err = f.service.create(&tenant(), "role-9", "policy-1", true).await.unwrap_err();
        assert!(matches!(err, RolePolicyError::RoleNotFound(_)));

        let err = f.service.create(&tenant(), "role-1", "policy-9", true).await.unwrap_err();
        assert!(matches!(err, RolePolicyError::PolicyNotFound(_)));
        assert!(f.repo.inserted().is_empty());
    }

    #[tokio::test]
    async fn create_inserts_with_clock_time() {
        let f = fixture();

        let row = f.service.create(&tenant(), "role-1", "policy-1", true).await.unwrap();

        assert_eq!(row.created_at, FixedClock::default().now());
        assert_eq!(f.repo.inserted(), vec![row]);
    }

    #[tokio::test]
    async fn create_batch_rejects_repeated_ids() {
        let f = fixture();
        let ids = vec!["policy-1".to_string(), "policy-1".to_string()];

        let err = f.service.create_batch(&tenant(), "role-1", &ids, true).await.unwrap_err();

        assert!(matches!(err, RolePolicyError::Duplicated { field: "policy_ids", .. }));
        assert!(f.repo.inserted().is_empty());
    }

    #[tokio::test]
    async fn create_batch_fails_whole_batch_on_one_linked_child() {
        let f = fixture();
        f.repo.link("role-1", "policy-2");
        let ids = vec!["policy-1".to_string(), "policy-2".to_string()];

        let err = f.service.create_batch(&tenant(), "role-1", &ids, true).await.unwrap_err();

        assert!(matches!(err, RolePolicyError::AlreadyHasThePolicy { .. }));
        assert!(f.repo.inserted().is_empty());
    }

    #[tokio::test]
    async fn delete_of_missing_row_does_not_touch_storage() {
        let f = fixture();

        let err = f.service.delete(&tenant(), "role-1", "rp-1").await.unwrap_err();

        assert!(matches!(err, RolePolicyError::IdHasBeenDeleted(_)));
        assert!(f.repo.deleted().is_empty());
        let smart: SmartError = err.into();
        assert_eq!(smart.code, "ERR_ROLE_POLICY_ID_HAS_BEEN_DELETED");
    }

    #[tokio::test]
    async fn delete_soft_deletes_existing_row() {
        let f = fixture();
        f.exists.insert("core_role_policies", "id", "rp-1");

        f.service.delete(&tenant(), "role-1", "rp-1").await.unwrap();

        assert_eq!(f.repo.deleted(), vec!["rp-1".to_string()]);
    }

    #[tokio::test]
    async fn update_with_no_affected_rows_is_not_found() {
        let f = fixture();
        f.exists.insert("core_role_policies", "id", "rp-1");
        f.repo.fail_writes_with_no_rows();

        let err = f.service.update(&tenant(), "role-2", "rp-1", false).await.unwrap_err();

        assert!(matches!(err, RolePolicyError::NotFound(_)));
    }

    #[tokio::test]
    async fn list_builds_pagination_from_total() {
        let f = fixture();
        f.service.create(&tenant(), "role-1", "policy-1", true).await.unwrap();
        f.service.create(&tenant(), "role-1", "policy-2", true).await.unwrap();

        let page = f.service.list(&tenant(), "role-1", &Pagination::new(1, 1)).await.unwrap();

        assert_eq!(page.pagination.total, 2);
        assert_eq!(page.pagination.last_page, 2);
    }

    #[tokio::test]
    async fn create_batch_inserts_every_row() {
        let f = fixture();
        let ids = vec!["policy-1".to_string(), "policy-2".to_string()];

        let rows = f.service.create_batch(&tenant(), "role-1", &ids, false).await.unwrap();

        assert_eq!(f.repo.inserted(), rows);
        let children: Vec<&str> = rows.iter().map(|r| r.child_id.as_str()).collect();
        assert_eq!(children, ["policy-1", "policy-2"]);
        assert!(rows.iter().all(|r| r.parent_id == "role-1" && !r.enable));
        assert_ne!(rows[0].id, rows[1].id);
    }

    #[tokio::test]
    async fn delete_batch_checks_every_id_before_deleting() {
        let f = fixture();
        f.exists.insert("core_role_policies", "id", "rp-1");
        let ids = vec!["rp-1".to_string(), "rp-2".to_string()];

        let err = f.service.delete_batch(&tenant(), "role-1", &ids).await.unwrap_err();

        assert!(matches!(&err, RolePolicyError::IdHasBeenDeleted(id) if id == "rp-2"));
        assert!(f.repo.deleted().is_empty());
    }

    #[tokio::test]
    async fn delete_batch_soft_deletes_all_rows() {
        let f = fixture();
        f.exists.insert("core_role_policies", "id", "rp-1");
        f.exists.insert("core_role_policies", "id", "rp-2");
        let ids = vec!["rp-1".to_string(), "rp-2".to_string()];

        f.service.delete_batch(&tenant(), "role-1", &ids).await.unwrap();

        assert_eq!(f.repo.deleted(), ids);
    }

    #[tokio::test]
    async fn delete_batch_names_the_row_that_went_missing() {
        let f = fixture();
        f.exists.insert("core_role_policies", "id", "rp-1");
        f.exists.insert("core_role_policies", "id", "rp-2");
        f.repo.vanish("rp-2");
        let ids = vec!["rp-1".to_string(), "rp-2".to_string()];

        let err = f.service.delete_batch(&tenant(), "role-1", &ids).await.unwrap_err();

        assert!(matches!(&err, RolePolicyError::IdHasBeenDeleted(id) if id == "rp-2"));
        assert!(f.repo.deleted().is_empty());
    }

    fn policy_permissions() -> (Arc<FakeJoinRows<PolicyPermission>>, Arc<FakeRecordExists>, PolicyPermissionService) {
        let repo = Arc::new(FakeJoinRows::default());
        let exists = Arc::new(FakeRecordExists::default());
        exists.insert("core_policies", "id", "policy-1");
        exists.insert("core_permissions", "id", "perm-1");
        let service = PolicyPermissionService::new(
            repo.clone(),
            exists.clone(),
            Arc::new(FixedClock::default()),
            Duration::from_secs(5),
        );
        (repo, exists, service)
    }

    #[tokio::test]
    async fn policy_permission_pair_is_unique() {
        let (repo, _, service) = policy_permissions();
        repo.link("policy-1", "perm-1");

        let err = service.create(&tenant(), "policy-1", "perm-1", true).await.unwrap_err();

        assert!(repo.inserted().is_empty());
        let smart: SmartError = err.into();
        assert_eq!(smart.code, "ERR_POLICY_ALREADY_HAS_THE_PERMISSION");
        assert_eq!(smart.status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn policy_permission_checks_policy_and_permission() {
        let (_, _, service) = policy_permissions();

        let err: SmartError = service.create(&tenant(), "policy-9", "perm-1", true).await.unwrap_err().into();
        assert_eq!(err.code, "ERR_POLICY_NOT_FOUND");

        let err: SmartError = service.create(&tenant(), "policy-1", "perm-9", true).await.unwrap_err().into();
        assert_eq!(err.code, "ERR_PERMISSION_NOT_FOUND");
    }

    #[tokio::test]
    async fn deleted_policy_permission_is_reported() {
        let (repo, _, service) = policy_permissions();

        let err = service.delete(&tenant(), "policy-1", "pp-1").await.unwrap_err();

        assert!(repo.deleted().is_empty());
        let smart: SmartError = err.into();
        assert_eq!(smart.code, "ERR_POLICY_PERMISSION_ID_HAS_BEEN_DELETED");
        assert_eq!(smart.status, StatusCode::NOT_FOUND);
    }
}
