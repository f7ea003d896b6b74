use std::sync::Arc;

use chrono::Duration;
use serde_json::Value as JsonValue;

use authkit_core::{AccountStore, AuthError, TenantId, User};
use authkit_session::{BooleanClaim, RefreshPolicy, fetcher_fn};

use crate::functions::{EmailOfUser, Functions};

pub const EMAIL_VERIFICATION_CLAIM_ID: &str = "st-ev";

/// The email a user signs in with on `tenant_id` (first matching login method).
pub fn email_for_tenant<'u>(user: &'u User, tenant_id: &TenantId) -> Option<&'u str> {
    user.login_methods
        .iter()
        .find(|m| m.tenant_id() == tenant_id)
        .map(|m| m.email())
}

/// `st-ev`: whether the session user's email is verified. Users without an email
/// count as verified.
pub fn email_verification_claim(functions: Functions, accounts: Arc<dyn AccountStore>) -> BooleanClaim {
    BooleanClaim::new(
        EMAIL_VERIFICATION_CLAIM_ID,
        fetcher_fn(move |user_id, tenant_id, ctx| {
            let functions = functions.clone();
            let accounts = accounts.clone();
            async move {
                let Some(user) = accounts.get_user(user_id).await? else {
                    return Err(AuthError::unknown_user(user_id.to_string()));
                };
                let Some(email) = email_for_tenant(&user, &tenant_id) else {
                    return Ok(Some(JsonValue::Bool(true)));
                };
                let verified = functions
                    .is_email_verified
                    .call(
                        EmailOfUser {
                            user_id,
                            email: email.to_string(),
                        },
                        &ctx,
                    )
                    .await?;
                Ok(Some(JsonValue::Bool(verified)))
            }
        }),
    )
    .with_refresh_policy(RefreshPolicy::max_age(Duration::minutes(5)))
}
