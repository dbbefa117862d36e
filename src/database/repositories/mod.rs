pub mod economic_activities;
pub mod join_rows;
pub mod users;

pub use economic_activities::{EconomicActivityRepository, MySqlEconomicActivityRepository};
pub use join_rows::{JoinRowRepository, JoinTable, MySqlJoinRowRepository, POLICY_PERMISSIONS, ROLE_POLICIES};
pub use users::{MySqlUserRepository, UserRepository};
