use std::sync::Arc;

use authkit_core::{AuthResult, RequestContext, TenantId, UserId};
use authkit_overrides::OverrideRegistry;
use authkit_session::PrimitiveArrayClaim;

use crate::claims::{permission_claim, user_role_claim};
use crate::functions::{
    DefaultFunctions, Functions, RolePermissionsInput, RoleResult, TenantRoleInput,
    TenantUserInput, UserRoleInput,
};
use crate::role::{Permission, Role};
use crate::store::RoleStore;

#[derive(Default)]
pub struct UserRolesConfig {
    pub functions: OverrideRegistry,
    /// Do not add `st-role` to new sessions.
    pub skip_adding_roles_to_access_token: bool,
    /// Do not add `st-perm` to new sessions.
    pub skip_adding_permissions_to_access_token: bool,
}

struct Inner {
    functions: Functions,
    role_claim: PrimitiveArrayClaim,
    permission_claim: PrimitiveArrayClaim,
    skip_roles: bool,
    skip_permissions: bool,
}

#[derive(Clone)]
pub struct UserRolesRecipe {
    inner: Arc<Inner>,
}

impl UserRolesRecipe {
    pub fn new(config: UserRolesConfig) -> Self {
        let functions = Functions::resolve(
            &config.functions,
            Arc::new(DefaultFunctions {
                store: RoleStore::new(),
            }),
        );
        tracing::debug!(
            overrides = ?config.functions.operation_ids(),
            skip_roles = config.skip_adding_roles_to_access_token,
            skip_permissions = config.skip_adding_permissions_to_access_token,
            "user-roles recipe initialised"
        );
        Self {
            inner: Arc::new(Inner {
                role_claim: user_role_claim(functions.clone()),
                permission_claim: permission_claim(functions.clone()),
                functions,
                skip_roles: config.skip_adding_roles_to_access_token,
                skip_permissions: config.skip_adding_permissions_to_access_token,
            }),
        }
    }

    pub fn functions(&self) -> &Functions {
        &self.inner.functions
    }

    pub fn role_claim(&self) -> &PrimitiveArrayClaim {
        &self.inner.role_claim
    }

    pub fn permission_claim(&self) -> &PrimitiveArrayClaim {
        &self.inner.permission_claim
    }

    /// Whether `st-role` is fetched when a session is created.
    pub fn adds_roles_on_create(&self) -> bool {
        !self.inner.skip_roles
    }

    /// Whether `st-perm` is fetched when a session is created.
    pub fn adds_permissions_on_create(&self) -> bool {
        !self.inner.skip_permissions
    }

    pub async fn create_new_role_or_add_permissions(
        &self,
        role: Role,
        permissions: Vec<Permission>,
        ctx: &RequestContext,
    ) -> AuthResult<bool> {
        self.inner
            .functions
            .create_new_role_or_add_permissions
            .call(RolePermissionsInput { role, permissions }, ctx)
            .await
    }

    pub async fn get_permissions_for_role(
        &self,
        role: Role,
        ctx: &RequestContext,
    ) -> AuthResult<RoleResult<Vec<Permission>>> {
        self.inner.functions.get_permissions_for_role.call(role, ctx).await
    }

    pub async fn remove_permissions_from_role(
        &self,
        role: Role,
        permissions: Vec<Permission>,
        ctx: &RequestContext,
    ) -> AuthResult<RoleResult<()>> {
        self.inner
            .functions
            .remove_permissions_from_role
            .call(RolePermissionsInput { role, permissions }, ctx)
            .await
    }

    pub async fn delete_role(&self, role: Role, ctx: &RequestContext) -> AuthResult<bool> {
        self.inner.functions.delete_role.call(role, ctx).await
    }

    pub async fn get_all_roles(
        &self,
        permission: Option<Permission>,
        ctx: &RequestContext,
    ) -> AuthResult<Vec<Role>> {
        self.inner.functions.get_all_roles.call(permission, ctx).await
    }

    #[tracing::instrument(skip_all, fields(tenant_id = %tenant_id, user_id = %user_id, role = %role))]
    pub async fn add_role_to_user(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        role: Role,
        ctx: &RequestContext,
    ) -> AuthResult<RoleResult<bool>> {
        self.inner
            .functions
            .add_role_to_user
            .call(
                UserRoleInput {
                    tenant_id,
                    user_id,
                    role,
                },
                ctx,
            )
            .await
    }

    #[tracing::instrument(skip_all, fields(tenant_id = %tenant_id, user_id = %user_id, role = %role))]
    pub async fn remove_user_role(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        role: Role,
        ctx: &RequestContext,
    ) -> AuthResult<RoleResult<bool>> {
        self.inner
            .functions
            .remove_user_role
            .call(
                UserRoleInput {
                    tenant_id,
                    user_id,
                    role,
                },
                ctx,
            )
            .await
    }

    pub async fn get_roles_for_user(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        ctx: &RequestContext,
    ) -> AuthResult<Vec<Role>> {
        self.inner
            .functions
            .get_roles_for_user
            .call(TenantUserInput { tenant_id, user_id }, ctx)
            .await
    }

    pub async fn get_users_that_have_role(
        &self,
        tenant_id: TenantId,
        role: Role,
        ctx: &RequestContext,
    ) -> AuthResult<RoleResult<Vec<UserId>>> {
        self.inner
            .functions
            .get_users_that_have_role
            .call(TenantRoleInput { tenant_id, role }, ctx)
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use authkit_overrides::layer_fn;
    use authkit_session::{
        ClaimsEngine, InMemorySessionStore, SessionConfig, SessionError, SessionRecipe,
        VerifySessionOptions,
    };

    use super::*;
    use crate::functions::GetRolesForUser;

    fn session_recipe(roles: &UserRolesRecipe) -> SessionRecipe {
        let mut builder = ClaimsEngine::builder();
        builder
            .register_claim_added_on_create(roles.role_claim().claim())
            .unwrap();
        builder
            .register_claim_added_on_create(roles.permission_claim().claim())
            .unwrap();
        SessionRecipe::new(
            SessionConfig::default(),
            builder.build(),
            Arc::new(InMemorySessionStore::new()),
        )
    }

    #[tokio::test]
    async fn role_lifecycle() {
        let recipe = UserRolesRecipe::new(UserRolesConfig::default());
        let ctx = RequestContext::new();
        let tenant = TenantId::default();
        let user = UserId::new();

        assert_eq!(
            recipe
                .add_role_to_user(tenant.clone(), user, "admin".into(), &ctx)
                .await
                .unwrap(),
            RoleResult::UnknownRole
        );

        assert!(
            recipe
                .create_new_role_or_add_permissions("admin".into(), vec!["users.read".into()], &ctx)
                .await
                .unwrap()
        );
        assert!(
            !recipe
                .create_new_role_or_add_permissions("admin".into(), vec!["users.write".into()], &ctx)
                .await
                .unwrap()
        );
        assert_eq!(
            recipe.get_permissions_for_role("admin".into(), &ctx).await.unwrap(),
            RoleResult::Ok(vec![Permission::new("users.read"), Permission::new("users.write")])
        );

        assert_eq!(
            recipe
                .add_role_to_user(tenant.clone(), user, "admin".into(), &ctx)
                .await
                .unwrap(),
            RoleResult::Ok(false)
        );
        assert_eq!(
            recipe
                .add_role_to_user(tenant.clone(), user, "admin".into(), &ctx)
                .await
                .unwrap(),
            RoleResult::Ok(true)
        );
        assert_eq!(
            recipe
                .get_users_that_have_role(tenant.clone(), "admin".into(), &ctx)
                .await
                .unwrap(),
            RoleResult::Ok(vec![user])
        );

        // Assignments are per tenant.
        assert!(
            recipe
                .get_roles_for_user(TenantId::new("acme"), user, &ctx)
                .await
                .unwrap()
                .is_empty()
        );

        assert!(recipe.delete_role("admin".into(), &ctx).await.unwrap());
        assert!(recipe.get_roles_for_user(tenant, user, &ctx).await.unwrap().is_empty());
        assert_eq!(
            recipe.get_permissions_for_role("admin".into(), &ctx).await.unwrap(),
            RoleResult::UnknownRole
        );
    }

    #[tokio::test]
    async fn get_all_roles_filters_by_permission() {
        let recipe = UserRolesRecipe::new(UserRolesConfig::default());
        let ctx = RequestContext::new();
        recipe
            .create_new_role_or_add_permissions("admin".into(), vec!["write".into(), "read".into()], &ctx)
            .await
            .unwrap();
        recipe
            .create_new_role_or_add_permissions("viewer".into(), vec!["read".into()], &ctx)
            .await
            .unwrap();
        recipe
            .remove_permissions_from_role("admin".into(), vec!["read".into()], &ctx)
            .await
            .unwrap();

        assert_eq!(
            recipe.get_all_roles(Some("read".into()), &ctx).await.unwrap(),
            vec![Role::new("viewer")]
        );
        assert_eq!(recipe.get_all_roles(None, &ctx).await.unwrap().len(), 2);
        assert_eq!(
            recipe
                .remove_permissions_from_role("ghost".into(), vec![], &ctx)
                .await
                .unwrap(),
            RoleResult::UnknownRole
        );
    }

    #[tokio::test]
    async fn new_sessions_carry_roles_and_permissions() {
        let recipe = UserRolesRecipe::new(UserRolesConfig::default());
        let session = session_recipe(&recipe);
        let ctx = RequestContext::new();
        let tenant = TenantId::default();
        let user = UserId::new();

        recipe
            .create_new_role_or_add_permissions("admin".into(), vec!["users.write".into()], &ctx)
            .await
            .unwrap();
        recipe
            .create_new_role_or_add_permissions("viewer".into(), vec!["users.read".into()], &ctx)
            .await
            .unwrap();
        for role in ["admin", "viewer"] {
            recipe
                .add_role_to_user(tenant.clone(), user, role.into(), &ctx)
                .await
                .unwrap();
        }

        let created = session.create_new_session(user, tenant, &ctx).await.unwrap();
        assert_eq!(
            created.claim_value(recipe.role_claim().id()),
            Some(&json!(["admin", "viewer"]))
        );
        assert_eq!(
            created.claim_value(recipe.permission_claim().id()),
            Some(&json!(["users.read", "users.write"]))
        );

        let options = VerifySessionOptions::append(vec![recipe.role_claim().includes("admin")]);
        assert!(session.verify_session(created.id, &options, &ctx).await.is_ok());
    }

    #[tokio::test]
    async fn missing_role_fails_verification() {
        let recipe = UserRolesRecipe::new(UserRolesConfig::default());
        let session = session_recipe(&recipe);
        let ctx = RequestContext::new();

        let created = session
            .create_new_session(UserId::new(), TenantId::default(), &ctx)
            .await
            .unwrap();
        let options = VerifySessionOptions::append(vec![recipe.role_claim().includes("admin")]);
        match session.verify_session(created.id, &options, &ctx).await {
            Err(SessionError::InvalidClaims(failures)) => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].claim_id.as_str(), "st-role");
            }
            other => panic!("expected claim failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn overridden_role_lookup_feeds_the_claim() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let recipe = UserRolesRecipe::new(UserRolesConfig {
            functions: OverrideRegistry::new().with::<GetRolesForUser>(layer_fn::<GetRolesForUser, _, _>(
                move |_inner, _input, _ctx| {
                    seen.fetch_add(1, Ordering::SeqCst);
                    async { Ok(vec![Role::new("auditor")]) }
                },
            )),
            ..UserRolesConfig::default()
        });
        let session = session_recipe(&recipe);
        let ctx = RequestContext::new();

        let created = session
            .create_new_session(UserId::new(), TenantId::default(), &ctx)
            .await
            .unwrap();
        assert_eq!(
            created.claim_value(recipe.role_claim().id()),
            Some(&json!(["auditor"]))
        );
        // One lookup per claim.
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(recipe.adds_roles_on_create());
    }
}
