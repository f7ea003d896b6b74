//! `st-role` and `st-perm` session claims.

use std::collections::BTreeSet;

use chrono::Duration;
use serde_json::Value as JsonValue;

use authkit_core::AuthResult;
use authkit_session::{PrimitiveArrayClaim, RefreshPolicy, fetcher_fn};

use crate::functions::{Functions, RoleResult, TenantUserInput};

pub const USER_ROLE_CLAIM_ID: &str = "st-role";
pub const PERMISSION_CLAIM_ID: &str = "st-perm";

const DEFAULT_MAX_AGE_MINUTES: i64 = 5;

/// Roles of the session user in the session's tenant.
pub fn user_role_claim(functions: Functions) -> PrimitiveArrayClaim {
    PrimitiveArrayClaim::new(
        USER_ROLE_CLAIM_ID,
        fetcher_fn(move |user_id, tenant_id, ctx| {
            let functions = functions.clone();
            async move {
                let roles = functions
                    .get_roles_for_user
                    .call(TenantUserInput { tenant_id, user_id }, &ctx)
                    .await?;
                let values = roles.iter().map(|r| JsonValue::from(r.as_str())).collect();
                AuthResult::Ok(Some(JsonValue::Array(values)))
            }
        }),
    )
    .with_refresh_policy(RefreshPolicy::max_age(Duration::minutes(DEFAULT_MAX_AGE_MINUTES)))
}

/// Union of the permissions of every role the session user holds.
pub fn permission_claim(functions: Functions) -> PrimitiveArrayClaim {
    PrimitiveArrayClaim::new(
        PERMISSION_CLAIM_ID,
        fetcher_fn(move |user_id, tenant_id, ctx| {
            let functions = functions.clone();
            async move {
                let roles = functions
                    .get_roles_for_user
                    .call(TenantUserInput { tenant_id, user_id }, &ctx)
                    .await?;

                let mut permissions = BTreeSet::new();
                for role in roles {
                    // A role deleted in between simply contributes nothing.
                    if let RoleResult::Ok(granted) =
                        functions.get_permissions_for_role.call(role, &ctx).await?
                    {
                        permissions.extend(granted);
                    }
                }
                let values = permissions
                    .iter()
                    .map(|p| JsonValue::from(p.as_str()))
                    .collect();
                AuthResult::Ok(Some(JsonValue::Array(values)))
            }
        }),
    )
    .with_refresh_policy(RefreshPolicy::max_age(Duration::minutes(DEFAULT_MAX_AGE_MINUTES)))
}
