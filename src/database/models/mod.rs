pub mod economic_activity;
pub mod join_rows;
pub mod menu;
pub mod user;

pub use economic_activity::{EconomicActivity, EconomicActivityFilter};
pub use join_rows::{NewJoinRow, Permission, PolicyByRolePolicy, PolicyPermission, RolePolicy};
pub use menu::{MenuModule, MenuRow, ModuleMenuUser, ViewMenuUser};
pub use user::{
    MerchantByUser, NewUser, Person, PersonData, PersonWrite, Role, RoleLink, RoleUser, StoreByUser, User,
    UserCredentials, UserFilter, UserMe, UserMeRow, UserMultiple, UserRole, UserRoleRow, UserType, UserUpdate,
};
