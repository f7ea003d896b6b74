use std::sync::Arc;

use authkit_core::{AuthResult, RequestContext, TenantId, UserId};
use authkit_overrides::{Handler, Implementation, Operation, OverrideRegistry};

use crate::role::{Permission, Role};
use crate::store::RoleStore;

/// Outcome of operations that require the role to exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleResult<T> {
    Ok(T),
    UnknownRole,
}

pub struct CreateNewRoleOrAddPermissions;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolePermissionsInput {
    pub role: Role,
    pub permissions: Vec<Permission>,
}

impl Operation for CreateNewRoleOrAddPermissions {
    const ID: &'static str = "userroles.create_new_role_or_add_permissions";
    type Input = RolePermissionsInput;
    /// `true` when the role was created by this call.
    type Output = AuthResult<bool>;
}

pub struct GetPermissionsForRole;

impl Operation for GetPermissionsForRole {
    const ID: &'static str = "userroles.get_permissions_for_role";
    type Input = Role;
    type Output = AuthResult<RoleResult<Vec<Permission>>>;
}

pub struct RemovePermissionsFromRole;

impl Operation for RemovePermissionsFromRole {
    const ID: &'static str = "userroles.remove_permissions_from_role";
    type Input = RolePermissionsInput;
    type Output = AuthResult<RoleResult<()>>;
}

pub struct DeleteRole;

impl Operation for DeleteRole {
    const ID: &'static str = "userroles.delete_role";
    type Input = Role;
    /// Whether the role existed.
    type Output = AuthResult<bool>;
}

pub struct GetAllRoles;

impl Operation for GetAllRoles {
    const ID: &'static str = "userroles.get_all_roles";
    /// Optionally only roles granting this permission.
    type Input = Option<Permission>;
    type Output = AuthResult<Vec<Role>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRoleInput {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub role: Role,
}

pub struct AddRoleToUser;

impl Operation for AddRoleToUser {
    const ID: &'static str = "userroles.add_role_to_user";
    type Input = UserRoleInput;
    /// `Ok(true)` when the user already had the role.
    type Output = AuthResult<RoleResult<bool>>;
}

pub struct RemoveUserRole;

impl Operation for RemoveUserRole {
    const ID: &'static str = "userroles.remove_user_role";
    type Input = UserRoleInput;
    /// `Ok(true)` when the user had the role.
    type Output = AuthResult<RoleResult<bool>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantUserInput {
    pub tenant_id: TenantId,
    pub user_id: UserId,
}

pub struct GetRolesForUser;

impl Operation for GetRolesForUser {
    const ID: &'static str = "userroles.get_roles_for_user";
    type Input = TenantUserInput;
    type Output = AuthResult<Vec<Role>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantRoleInput {
    pub tenant_id: TenantId,
    pub role: Role,
}

pub struct GetUsersThatHaveRole;

impl Operation for GetUsersThatHaveRole {
    const ID: &'static str = "userroles.get_users_that_have_role";
    type Input = TenantRoleInput;
    type Output = AuthResult<RoleResult<Vec<UserId>>>;
}

#[derive(Clone)]
pub struct Functions {
    pub create_new_role_or_add_permissions: Implementation<CreateNewRoleOrAddPermissions>,
    pub get_permissions_for_role: Implementation<GetPermissionsForRole>,
    pub remove_permissions_from_role: Implementation<RemovePermissionsFromRole>,
    pub delete_role: Implementation<DeleteRole>,
    pub get_all_roles: Implementation<GetAllRoles>,
    pub add_role_to_user: Implementation<AddRoleToUser>,
    pub remove_user_role: Implementation<RemoveUserRole>,
    pub get_roles_for_user: Implementation<GetRolesForUser>,
    pub get_users_that_have_role: Implementation<GetUsersThatHaveRole>,
}

impl Functions {
    pub(crate) fn resolve(registry: &OverrideRegistry, base: Arc<DefaultFunctions>) -> Self {
        Self {
            create_new_role_or_add_permissions: registry
                .resolve::<CreateNewRoleOrAddPermissions>(base.clone()),
            get_permissions_for_role: registry.resolve::<GetPermissionsForRole>(base.clone()),
            remove_permissions_from_role: registry.resolve::<RemovePermissionsFromRole>(base.clone()),
            delete_role: registry.resolve::<DeleteRole>(base.clone()),
            get_all_roles: registry.resolve::<GetAllRoles>(base.clone()),
            add_role_to_user: registry.resolve::<AddRoleToUser>(base.clone()),
            remove_user_role: registry.resolve::<RemoveUserRole>(base.clone()),
            get_roles_for_user: registry.resolve::<GetRolesForUser>(base.clone()),
            get_users_that_have_role: registry.resolve::<GetUsersThatHaveRole>(base),
        }
    }
}

pub(crate) struct DefaultFunctions {
    pub(crate) store: RoleStore,
}

#[async_trait::async_trait]
impl Handler<CreateNewRoleOrAddPermissions> for DefaultFunctions {
    async fn call(&self, input: RolePermissionsInput, _ctx: &RequestContext) -> AuthResult<bool> {
        let created = self.store.upsert_role(&input.role, &input.permissions)?;
        if created {
            tracing::info!(role = %input.role, "role created");
        }
        Ok(created)
    }
}

#[async_trait::async_trait]
impl Handler<GetPermissionsForRole> for DefaultFunctions {
    async fn call(&self, role: Role, _ctx: &RequestContext) -> AuthResult<RoleResult<Vec<Permission>>> {
        Ok(match self.store.permissions(&role)? {
            Some(permissions) => RoleResult::Ok(permissions),
            None => RoleResult::UnknownRole,
        })
    }
}

#[async_trait::async_trait]
impl Handler<RemovePermissionsFromRole> for DefaultFunctions {
    async fn call(&self, input: RolePermissionsInput, _ctx: &RequestContext) -> AuthResult<RoleResult<()>> {
        Ok(if self.store.remove_permissions(&input.role, &input.permissions)? {
            RoleResult::Ok(())
        } else {
            RoleResult::UnknownRole
        })
    }
}

#[async_trait::async_trait]
impl Handler<DeleteRole> for DefaultFunctions {
    async fn call(&self, role: Role, _ctx: &RequestContext) -> AuthResult<bool> {
        self.store.delete_role(&role)
    }
}

#[async_trait::async_trait]
impl Handler<GetAllRoles> for DefaultFunctions {
    async fn call(&self, permission: Option<Permission>, _ctx: &RequestContext) -> AuthResult<Vec<Role>> {
        self.store.all_roles(permission.as_ref())
    }
}

#[async_trait::async_trait]
impl Handler<AddRoleToUser> for DefaultFunctions {
    async fn call(&self, input: UserRoleInput, _ctx: &RequestContext) -> AuthResult<RoleResult<bool>> {
        Ok(
            match self.store.assign_if_exists(&input.tenant_id, input.user_id, &input.role)? {
                Some(already) => RoleResult::Ok(already),
                None => RoleResult::UnknownRole,
            },
        )
    }
}

#[async_trait::async_trait]
impl Handler<RemoveUserRole> for DefaultFunctions {
    async fn call(&self, input: UserRoleInput, _ctx: &RequestContext) -> AuthResult<RoleResult<bool>> {
        Ok(
            match self.store.unassign_if_exists(&input.tenant_id, input.user_id, &input.role)? {
                Some(had) => RoleResult::Ok(had),
                None => RoleResult::UnknownRole,
            },
        )
    }
}

#[async_trait::async_trait]
impl Handler<GetRolesForUser> for DefaultFunctions {
    async fn call(&self, input: TenantUserInput, _ctx: &RequestContext) -> AuthResult<Vec<Role>> {
        self.store.roles_for_user(&input.tenant_id, input.user_id)
    }
}

#[async_trait::async_trait]
impl Handler<GetUsersThatHaveRole> for DefaultFunctions {
    async fn call(&self, input: TenantRoleInput, _ctx: &RequestContext) -> AuthResult<RoleResult<Vec<UserId>>> {
        if !self.store.role_exists(&input.role)? {
            return Ok(RoleResult::UnknownRole);
        }
        Ok(RoleResult::Ok(self.store.users_with_role(&input.tenant_id, &input.role)?))
    }
}
