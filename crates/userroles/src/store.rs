//! In-memory role/permission/user-role storage.
//!
//! Roles and their permissions are app-wide; role assignments are per tenant.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::RwLock;

use authkit_core::{AuthError, AuthResult, TenantId, UserId};

use crate::role::{Permission, Role};

#[derive(Debug, Default)]
pub struct RoleStore {
    roles: RwLock<BTreeMap<Role, BTreeSet<Permission>>>,
    assignments: RwLock<HashMap<(TenantId, UserId), BTreeSet<Role>>>,
}

impl RoleStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> AuthError {
        AuthError::store("role store lock poisoned")
    }

    /// Returns `true` if the role did not exist before.
    pub fn upsert_role(&self, role: &Role, permissions: &[Permission]) -> AuthResult<bool> {
        let mut roles = self.roles.write().map_err(|_| Self::poisoned())?;
        let created = !roles.contains_key(role);
        roles
            .entry(role.clone())
            .or_default()
            .extend(permissions.iter().cloned());
        Ok(created)
    }

    pub fn permissions(&self, role: &Role) -> AuthResult<Option<Vec<Permission>>> {
        let roles = self.roles.read().map_err(|_| Self::poisoned())?;
        Ok(roles.get(role).map(|p| p.iter().cloned().collect()))
    }

    /// Returns `false` if the role does not exist.
    pub fn remove_permissions(&self, role: &Role, permissions: &[Permission]) -> AuthResult<bool> {
        let mut roles = self.roles.write().map_err(|_| Self::poisoned())?;
        let Some(existing) = roles.get_mut(role) else {
            return Ok(false);
        };
        for permission in permissions {
            existing.remove(permission);
        }
        Ok(true)
    }

    /// Deletes the role and every assignment of it.
    ///
    /// Lock order is always `roles` then `assignments`; the `roles` guard is held
    /// until the assignments are cleaned.
    pub fn delete_role(&self, role: &Role) -> AuthResult<bool> {
        let mut roles = self.roles.write().map_err(|_| Self::poisoned())?;
        let existed = roles.remove(role).is_some();
        let mut assignments = self.assignments.write().map_err(|_| Self::poisoned())?;
        for assigned in assignments.values_mut() {
            assigned.remove(role);
        }
        assignments.retain(|_, assigned| !assigned.is_empty());
        Ok(existed)
    }

    pub fn all_roles(&self, with_permission: Option<&Permission>) -> AuthResult<Vec<Role>> {
        let roles = self.roles.read().map_err(|_| Self::poisoned())?;
        Ok(roles
            .iter()
            .filter(|(_, permissions)| with_permission.is_none_or(|p| permissions.contains(p)))
            .map(|(role, _)| role.clone())
            .collect())
    }

    pub fn role_exists(&self, role: &Role) -> AuthResult<bool> {
        let roles = self.roles.read().map_err(|_| Self::poisoned())?;
        Ok(roles.contains_key(role))
    }

    /// Assigns the role only if it exists, under one critical section.
    ///
    /// `None` when the role is unknown, otherwise whether the user already had it.
    pub fn assign_if_exists(
        &self,
        tenant_id: &TenantId,
        user_id: UserId,
        role: &Role,
    ) -> AuthResult<Option<bool>> {
        let roles = self.roles.read().map_err(|_| Self::poisoned())?;
        if !roles.contains_key(role) {
            return Ok(None);
        }
        let mut assignments = self.assignments.write().map_err(|_| Self::poisoned())?;
        let inserted = assignments
            .entry((tenant_id.clone(), user_id))
            .or_default()
            .insert(role.clone());
        Ok(Some(!inserted))
    }

    /// `None` when the role is unknown, otherwise whether the user had it.
    pub fn unassign_if_exists(
        &self,
        tenant_id: &TenantId,
        user_id: UserId,
        role: &Role,
    ) -> AuthResult<Option<bool>> {
        let roles = self.roles.read().map_err(|_| Self::poisoned())?;
        if !roles.contains_key(role) {
            return Ok(None);
        }
        let mut assignments = self.assignments.write().map_err(|_| Self::poisoned())?;
        Ok(Some(Self::remove_assignment(&mut assignments, tenant_id, user_id, role)))
    }

    fn remove_assignment(
        assignments: &mut HashMap<(TenantId, UserId), BTreeSet<Role>>,
        tenant_id: &TenantId,
        user_id: UserId,
        role: &Role,
    ) -> bool {
        let key = (tenant_id.clone(), user_id);
        let Some(roles) = assignments.get_mut(&key) else {
            return false;
        };
        let had = roles.remove(role);
        if roles.is_empty() {
            assignments.remove(&key);
        }
        had
    }

    pub fn roles_for_user(&self, tenant_id: &TenantId, user_id: UserId) -> AuthResult<Vec<Role>> {
        let assignments = self.assignments.read().map_err(|_| Self::poisoned())?;
        Ok(assignments
            .get(&(tenant_id.clone(), user_id))
            .map(|roles| roles.iter().cloned().collect())
            .unwrap_or_default())
    }

    pub fn users_with_role(&self, tenant_id: &TenantId, role: &Role) -> AuthResult<Vec<UserId>> {
        let assignments = self.assignments.read().map_err(|_| Self::poisoned())?;
        let mut users: Vec<UserId> = assignments
            .iter()
            .filter(|((tenant, _), roles)| tenant == tenant_id && roles.contains(role))
            .map(|((_, user), _)| *user)
            .collect();
        users.sort_unstable();
        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deleting_a_role_drops_assignments() {
        let store = RoleStore::new();
        let tenant = TenantId::default();
        let user = UserId::new();
        let admin = Role::new("admin");

        assert!(store.upsert_role(&admin, &[Permission::new("users.read")]).unwrap());
        assert!(!store.upsert_role(&admin, &[Permission::new("users.write")]).unwrap());
        assert_eq!(store.assign_if_exists(&tenant, user, &admin).unwrap(), Some(false));
        assert_eq!(store.assign_if_exists(&tenant, user, &admin).unwrap(), Some(true));

        assert!(store.delete_role(&admin).unwrap());
        assert!(store.roles_for_user(&tenant, user).unwrap().is_empty());
        assert!(!store.delete_role(&admin).unwrap());
    }

    #[test]
    fn assignments_are_per_tenant() {
        let store = RoleStore::new();
        let user = UserId::new();
        let admin = Role::new("admin");
        store.upsert_role(&admin, &[]).unwrap();
        store.assign_if_exists(&TenantId::new("t1"), user, &admin).unwrap();

        assert_eq!(store.roles_for_user(&TenantId::new("t1"), user).unwrap(), vec![admin.clone()]);
        assert!(store.roles_for_user(&TenantId::new("t2"), user).unwrap().is_empty());
        assert_eq!(store.users_with_role(&TenantId::new("t1"), &admin).unwrap(), vec![user]);
    }

    #[test]
    fn assignment_of_a_deleted_role_is_refused() {
        let store = RoleStore::new();
        let tenant = TenantId::default();
        let user = UserId::new();
        let admin = Role::new("admin");
        store.upsert_role(&admin, &[]).unwrap();

        // A role-existence check made before the delete must not let the grant through.
        assert!(store.role_exists(&admin).unwrap());
        assert!(store.delete_role(&admin).unwrap());
        assert_eq!(store.assign_if_exists(&tenant, user, &admin).unwrap(), None);
        assert!(store.roles_for_user(&tenant, user).unwrap().is_empty());
        assert_eq!(store.unassign_if_exists(&tenant, user, &admin).unwrap(), None);

        // Re-creating the role does not revive an old grant.
        store.upsert_role(&admin, &[]).unwrap();
        assert!(store.roles_for_user(&tenant, user).unwrap().is_empty());
        assert_eq!(store.assign_if_exists(&tenant, user, &admin).unwrap(), Some(false));
        assert_eq!(store.unassign_if_exists(&tenant, user, &admin).unwrap(), Some(true));
    }

    #[test]
    fn concurrent_grants_and_deletes_leave_no_orphaned_assignment() {
        use std::sync::Arc;

        let store = Arc::new(RoleStore::new());
        let tenant = TenantId::default();
        let admin = Role::new("admin");

        for _ in 0..50 {
            store.upsert_role(&admin, &[]).unwrap();
            let users: Vec<UserId> = (0..4).map(|_| UserId::new()).collect();
            let granters: Vec<_> = users
                .iter()
                .map(|user| {
                    let (store, tenant, admin, user) =
                        (store.clone(), tenant.clone(), admin.clone(), *user);
                    std::thread::spawn(move || store.assign_if_exists(&tenant, user, &admin).unwrap())
                })
                .collect();
            let deleter = {
                let (store, admin) = (store.clone(), admin.clone());
                std::thread::spawn(move || store.delete_role(&admin).unwrap())
            };
            for granter in granters {
                granter.join().unwrap();
            }
            assert!(deleter.join().unwrap());

            assert!(!store.role_exists(&admin).unwrap());
            for user in &users {
                assert!(store.roles_for_user(&tenant, *user).unwrap().is_empty());
            }
        }
    }

    #[test]
    fn roles_filtered_by_permission() {
        let store = RoleStore::new();
        store.upsert_role(&Role::new("admin"), &[Permission::new("a"), Permission::new("b")]).unwrap();
        store.upsert_role(&Role::new("viewer"), &[Permission::new("a")]).unwrap();

        assert_eq!(store.all_roles(None).unwrap().len(), 2);
        assert_eq!(
            store.all_roles(Some(&Permission::new("b"))).unwrap(),
            vec![Role::new("admin")]
        );
    }
}
