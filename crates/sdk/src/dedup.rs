//! Override layers that keep one person from ending up with two unrelated accounts
//! under the same email.
//!
//! These only improve the error users see. Uniqueness per login method is enforced by
//! the account store itself.

use std::sync::Arc;

use authkit_core::{AccountInfo, AccountStore, AuthResult, normalize_email};
use authkit_emailpassword::{SignUp, SignUpResult};
use authkit_overrides::{Layer, layer_fn};
use authkit_thirdparty::{SignInUp, SignInUpPost, SignInUpPostResult, SignInUpResult};

pub const ACCOUNT_EXISTS_MESSAGE: &str =
    "Seems like you already have an account with another method. Please use that instead.";

/// Layer on third-party `SignInUp`: refuse when the email already belongs to a
/// different login method in the tenant.
pub fn deny_third_party_when_email_exists(accounts: Arc<dyn AccountStore>) -> impl Layer<SignInUp> {
    layer_fn::<SignInUp, _, _>(move |inner, input, ctx| {
        let accounts = accounts.clone();
        async move {
            let email = normalize_email(&input.email);
            let users = accounts
                .list_by_account_info(&input.tenant_id, &AccountInfo::email(email.clone()))
                .await?;
            let taken = users.iter().flat_map(|u| &u.login_methods).any(|m| {
                *m.tenant_id() == input.tenant_id
                    && m.email() == email
                    && m.third_party() != Some(&input.third_party)
            });
            if taken {
                tracing::warn!(
                    tenant_id = %input.tenant_id,
                    third_party_id = %input.third_party.third_party_id,
                    "third-party sign-in refused, email used by another login method"
                );
                return AuthResult::Ok(SignInUpResult::EmailAlreadyUsed { email });
            }
            inner.call(input, &ctx).await
        }
    })
}

/// Layer on email-password `SignUp`: refuse when any login method owns the email.
pub fn deny_email_password_when_email_exists(accounts: Arc<dyn AccountStore>) -> impl Layer<SignUp> {
    layer_fn::<SignUp, _, _>(move |inner, input, ctx| {
        let accounts = accounts.clone();
        async move {
            let users = accounts
                .list_by_account_info(&input.tenant_id, &AccountInfo::email(input.email.clone()))
                .await?;
            if !users.is_empty() {
                tracing::warn!(tenant_id = %input.tenant_id, "sign-up refused, email already in use");
                return AuthResult::Ok(SignUpResult::EmailAlreadyExists);
            }
            inner.call(input, &ctx).await
        }
    })
}

/// API layer on `SignInUpPost`: surface a refusal as a readable general error.
pub fn general_error_on_sign_in_up_not_allowed() -> impl Layer<SignInUpPost> {
    layer_fn::<SignInUpPost, _, _>(|inner, input, ctx| async move {
        match inner.call(input, &ctx).await? {
            SignInUpPostResult::SignInUpNotAllowed { .. } => {
                AuthResult::Ok(SignInUpPostResult::GeneralError {
                    message: ACCOUNT_EXISTS_MESSAGE.to_string(),
                })
            }
            other => Ok(other),
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use authkit_core::{AppInfo, InMemoryAccountStore, RequestContext, TenantId, ThirdPartyInfo};
    use authkit_emailpassword::{EmailPasswordConfig, SignUpPostResult};
    use authkit_overrides::OverrideRegistry;
    use authkit_thirdparty::{SignInUpPostInput, ThirdPartyConfig};

    use super::*;
    use crate::AuthKit;

    fn google(sub: &str) -> ThirdPartyInfo {
        ThirdPartyInfo {
            third_party_id: "google".to_string(),
            third_party_user_id: sub.to_string(),
        }
    }

    struct Fixture {
        kit: AuthKit,
        sign_up_calls: Arc<AtomicUsize>,
        sign_in_up_calls: Arc<AtomicUsize>,
    }

    /// Registers a counting layer first, so the dedup layer wraps it.
    fn fixture() -> Fixture {
        let accounts: Arc<dyn AccountStore> = Arc::new(InMemoryAccountStore::new());
        let sign_up_calls = Arc::new(AtomicUsize::new(0));
        let sign_in_up_calls = Arc::new(AtomicUsize::new(0));

        let seen = sign_up_calls.clone();
        let email_password = EmailPasswordConfig {
            functions: OverrideRegistry::new()
                .with::<SignUp>(layer_fn::<SignUp, _, _>(move |inner, input, ctx| {
                    seen.fetch_add(1, Ordering::SeqCst);
                    async move { inner.call(input, &ctx).await }
                }))
                .with::<SignUp>(deny_email_password_when_email_exists(accounts.clone())),
            password_hash_cost: 4,
            ..EmailPasswordConfig::default()
        };

        let seen = sign_in_up_calls.clone();
        let third_party = ThirdPartyConfig {
            functions: OverrideRegistry::new()
                .with::<SignInUp>(layer_fn::<SignInUp, _, _>(move |inner, input, ctx| {
                    seen.fetch_add(1, Ordering::SeqCst);
                    async move { inner.call(input, &ctx).await }
                }))
                .with::<SignInUp>(deny_third_party_when_email_exists(accounts.clone())),
            apis: OverrideRegistry::new().with::<SignInUpPost>(general_error_on_sign_in_up_not_allowed()),
        };

        let kit = AuthKit::builder(AppInfo::new("demo", "http://localhost:3001", "http://localhost:3000"))
            .account_store(accounts)
            .email_password(email_password)
            .third_party(third_party)
            .build()
            .unwrap();
        Fixture {
            kit,
            sign_up_calls,
            sign_in_up_calls,
        }
    }

    fn sign_in_up_input(sub: &str, email: &str) -> SignInUpPostInput {
        SignInUpPostInput {
            tenant_id: TenantId::default(),
            third_party: google(sub),
            email: email.to_string(),
            email_verified: true,
        }
    }

    #[tokio::test]
    async fn fresh_email_reaches_inner_sign_up() {
        let f = fixture();
        let ctx = RequestContext::new();
        let result = f
            .kit
            .email_password()
            .unwrap()
            .sign_up(TenantId::default(), "new@x.com", "password1", &ctx)
            .await
            .unwrap();
        assert!(matches!(result, SignUpResult::Created { .. }));
        assert_eq!(f.sign_up_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn third_party_sign_up_with_password_users_email_gets_general_error() {
        let f = fixture();
        let ctx = RequestContext::new();
        f.kit
            .email_password()
            .unwrap()
            .sign_up(TenantId::default(), "a@x.com", "password1", &ctx)
            .await
            .unwrap();

        let result = f
            .kit
            .third_party()
            .unwrap()
            .sign_in_up_post(sign_in_up_input("g-1", "A@x.com"), &ctx)
            .await
            .unwrap();
        match result {
            SignInUpPostResult::GeneralError { message } => {
                assert!(message.contains("already have an account"));
            }
            other => panic!("expected general error, got {other:?}"),
        }
        assert_eq!(f.sign_in_up_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn password_sign_up_with_third_party_users_email_is_refused() {
        let f = fixture();
        let ctx = RequestContext::new();
        let first = f
            .kit
            .third_party()
            .unwrap()
            .sign_in_up_post(sign_in_up_input("g-1", "b@x.com"), &ctx)
            .await
            .unwrap();
        assert!(matches!(first, SignInUpPostResult::Ok { created_new_user: true, .. }));

        let result = f
            .kit
            .email_password()
            .unwrap()
            .sign_up_post(
                TenantId::default(),
                &[
                    authkit_emailpassword::FormField::new("email", "b@x.com"),
                    authkit_emailpassword::FormField::new("password", "password1"),
                ],
                &ctx,
            )
            .await
            .unwrap();
        assert_eq!(result, SignUpPostResult::EmailAlreadyExists);
        assert_eq!(f.sign_up_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn same_identity_signs_in_again() {
        let f = fixture();
        let ctx = RequestContext::new();
        let tp = f.kit.third_party().unwrap();
        tp.sign_in_up_post(sign_in_up_input("g-1", "c@x.com"), &ctx)
            .await
            .unwrap();
        let again = tp
            .sign_in_up_post(sign_in_up_input("g-1", "c@x.com"), &ctx)
            .await
            .unwrap();
        assert!(matches!(again, SignInUpPostResult::Ok { created_new_user: false, .. }));
        assert_eq!(f.sign_in_up_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn other_tenants_are_unaffected() {
        let f = fixture();
        let ctx = RequestContext::new();
        f.kit
            .email_password()
            .unwrap()
            .sign_up(TenantId::default(), "d@x.com", "password1", &ctx)
            .await
            .unwrap();
        let result = f
            .kit
            .third_party()
            .unwrap()
            .sign_in_up_post(
                SignInUpPostInput {
                    tenant_id: TenantId::new("acme"),
                    ..sign_in_up_input("g-2", "d@x.com")
                },
                &ctx,
            )
            .await
            .unwrap();
        assert!(matches!(result, SignInUpPostResult::Ok { .. }));
    }
}
