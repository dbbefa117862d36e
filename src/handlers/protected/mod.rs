pub mod economic_activities;
pub mod join_rows;
pub mod policy_permissions;
pub mod role_policies;
pub mod users;
