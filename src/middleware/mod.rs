pub mod auth;
pub mod response;
pub mod tenant;

pub use auth::{jwt_auth_middleware, AuthUser};
pub use response::{ApiResponse, ApiResult, PageResponse, PageResult};
pub use tenant::{tenant_middleware, TENANT_HEADER};
