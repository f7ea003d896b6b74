//! `authkit-userroles` — roles, permissions, and the `st-role` / `st-perm` claims.

pub mod claims;
pub mod functions;
pub mod recipe;
pub mod role;
pub mod store;

pub use claims::{PERMISSION_CLAIM_ID, USER_ROLE_CLAIM_ID, permission_claim, user_role_claim};
pub use functions::{
    AddRoleToUser, CreateNewRoleOrAddPermissions, DeleteRole, Functions, GetAllRoles,
    GetPermissionsForRole, GetRolesForUser, GetUsersThatHaveRole, RemovePermissionsFromRole,
    RemoveUserRole, RolePermissionsInput, RoleResult, TenantRoleInput, TenantUserInput,
    UserRoleInput,
};
pub use recipe::{UserRolesConfig, UserRolesRecipe};
pub use role::{Permission, Role};
pub use store::RoleStore;
