use axum::{extract::Request, http::StatusCode, middleware::Next, response::Response};
use tracing::warn;

use super::auth::AuthUser;
use crate::database::TenantId;
use crate::error::{ErrorLayer, SmartError};

pub const TENANT_HEADER: &str = "x-tenant-id";

/// Resolves the `x-tenant-id` header into a `TenantId` request extension.
///
/// Behind JWT authentication the token's tenant must match the header.
pub async fn tenant_middleware(mut request: Request, next: Next) -> Result<Response, SmartError> {
    let header = request
        .headers()
        .get(TENANT_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            SmartError::new(
                "ERR_TENANT_REQUIRED",
                "The x-tenant-id header is required",
                StatusCode::BAD_REQUEST,
                ErrorLayer::Interface,
            )
        })?;

    let tenant = TenantId::parse(header)?;

    if let Some(user) = request.extensions().get::<AuthUser>() {
        if user.tenant_id != tenant.as_str() {
            warn!(%tenant, token_tenant = %user.tenant_id, user_id = %user.user_id, "Tenant mismatch");
            return Err(SmartError::new(
                "ERR_TENANT_MISMATCH",
                "The token was not issued for this tenant",
                StatusCode::FORBIDDEN,
                ErrorLayer::Interface,
            ));
        }
    }

    request.extensions_mut().insert(tenant);
    Ok(next.run(request).await)
}
