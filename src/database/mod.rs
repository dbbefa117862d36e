pub mod manager;
pub mod models;
pub mod query_builder;
pub mod record_exists;
pub mod repositories;
pub mod transaction;

pub use manager::{ConnectionProvider, DatabaseError, DatabaseManager, TenantId};
pub use record_exists::{ExistsCheck, MySqlRecordExists, RecordExists};
