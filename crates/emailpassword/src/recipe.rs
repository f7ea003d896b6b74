use std::sync::Arc;

use chrono::Duration;

use authkit_core::{
    AccountStore, AppInfo, AuthResult, EmailDeliveryInput, EmailDeliveryService, RequestContext,
    TenantId, UserId,
};
use authkit_overrides::{Implementation, OverrideRegistry};
use authkit_session::SessionRecipe;

use crate::api::{
    Apis, DefaultApis, EmailExistsGetInput, GeneratePasswordResetTokenPostInput,
    GeneratePasswordResetTokenPostResult, PasswordResetPostInput, PasswordResetPostResult,
    SignInPostInput, SignInPostResult, SignUpPostInput, SignUpPostResult,
};
use crate::delivery::{DefaultSendEmail, SendEmail};
use crate::form::{self, FormField};
use crate::functions::{
    ConsumePasswordResetTokenInput, ConsumePasswordResetTokenResult, CreateResetPasswordTokenInput,
    CreateResetPasswordTokenResult, DefaultFunctions, Functions, SignInInput, SignInResult,
    SignUpInput, SignUpResult, UpdateEmailOrPasswordInput, UpdateEmailOrPasswordResult,
};
use crate::token::ResetTokenStore;

pub struct EmailPasswordConfig {
    pub functions: OverrideRegistry,
    pub apis: OverrideRegistry,
    pub email_delivery: OverrideRegistry,
    pub reset_token_ttl: Duration,
    /// bcrypt cost factor.
    pub password_hash_cost: u32,
}

impl Default for EmailPasswordConfig {
    fn default() -> Self {
        Self {
            functions: OverrideRegistry::new(),
            apis: OverrideRegistry::new(),
            email_delivery: OverrideRegistry::new(),
            reset_token_ttl: Duration::hours(1),
            password_hash_cost: bcrypt::DEFAULT_COST,
        }
    }
}

/// Collaborators the recipe is wired to.
#[derive(Clone)]
pub struct EmailPasswordDeps {
    pub app_info: AppInfo,
    pub accounts: Arc<dyn AccountStore>,
    pub email_service: Arc<dyn EmailDeliveryService>,
    pub session: SessionRecipe,
}

struct Inner {
    functions: Functions,
    apis: Apis,
    send_email: Implementation<SendEmail>,
}

#[derive(Clone)]
pub struct EmailPasswordRecipe {
    inner: Arc<Inner>,
}

impl EmailPasswordRecipe {
    pub fn new(config: EmailPasswordConfig, deps: EmailPasswordDeps) -> Self {
        let functions = Functions::resolve(
            &config.functions,
            Arc::new(DefaultFunctions {
                store: deps.accounts.clone(),
                tokens: ResetTokenStore::new(),
                reset_token_ttl: config.reset_token_ttl,
                password_hash_cost: config.password_hash_cost,
            }),
        );
        let send_email = config.email_delivery.resolve::<SendEmail>(Arc::new(DefaultSendEmail {
            service: deps.email_service,
        }));
        let apis = Apis::resolve(
            &config.apis,
            Arc::new(DefaultApis {
                functions: functions.clone(),
                send_email: send_email.clone(),
                session: deps.session,
                store: deps.accounts,
                app_info: deps.app_info,
            }),
        );

        tracing::debug!(
            function_overrides = ?config.functions.operation_ids(),
            api_overrides = ?config.apis.operation_ids(),
            "email-password recipe initialised"
        );
        Self {
            inner: Arc::new(Inner {
                functions,
                apis,
                send_email,
            }),
        }
    }

    pub fn functions(&self) -> &Functions {
        &self.inner.functions
    }

    pub fn apis(&self) -> &Apis {
        &self.inner.apis
    }

    pub async fn sign_up(
        &self,
        tenant_id: TenantId,
        email: &str,
        password: &str,
        ctx: &RequestContext,
    ) -> AuthResult<SignUpResult> {
        self.inner
            .functions
            .sign_up
            .call(
                SignUpInput {
                    tenant_id,
                    email: email.to_string(),
                    password: password.to_string(),
                },
                ctx,
            )
            .await
    }

    pub async fn sign_in(
        &self,
        tenant_id: TenantId,
        email: &str,
        password: &str,
        ctx: &RequestContext,
    ) -> AuthResult<SignInResult> {
        self.inner
            .functions
            .sign_in
            .call(
                SignInInput {
                    tenant_id,
                    email: email.to_string(),
                    password: password.to_string(),
                },
                ctx,
            )
            .await
    }

    pub async fn create_reset_password_token(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        email: &str,
        ctx: &RequestContext,
    ) -> AuthResult<CreateResetPasswordTokenResult> {
        self.inner
            .functions
            .create_reset_password_token
            .call(
                CreateResetPasswordTokenInput {
                    tenant_id,
                    user_id,
                    email: email.to_string(),
                },
                ctx,
            )
            .await
    }

    pub async fn consume_password_reset_token(
        &self,
        tenant_id: TenantId,
        token: &str,
        ctx: &RequestContext,
    ) -> AuthResult<ConsumePasswordResetTokenResult> {
        self.inner
            .functions
            .consume_password_reset_token
            .call(
                ConsumePasswordResetTokenInput {
                    tenant_id,
                    token: token.to_string(),
                },
                ctx,
            )
            .await
    }

    pub async fn update_email_or_password(
        &self,
        user_id: UserId,
        email: Option<&str>,
        password: Option<&str>,
        ctx: &RequestContext,
    ) -> AuthResult<UpdateEmailOrPasswordResult> {
        self.inner
            .functions
            .update_email_or_password
            .call(
                UpdateEmailOrPasswordInput {
                    user_id,
                    email: email.map(str::to_string),
                    password: password.map(str::to_string),
                },
                ctx,
            )
            .await
    }

    pub async fn send_email(&self, input: EmailDeliveryInput, ctx: &RequestContext) -> AuthResult<()> {
        self.inner.send_email.call(input, ctx).await
    }

    #[tracing::instrument(skip_all, fields(tenant_id = %tenant_id))]
    pub async fn sign_up_post(
        &self,
        tenant_id: TenantId,
        form_fields: &[FormField],
        ctx: &RequestContext,
    ) -> AuthResult<SignUpPostResult> {
        let credentials = match form::validate_credentials(form_fields, true) {
            Ok(credentials) => credentials,
            Err(form_fields) => return Ok(SignUpPostResult::FieldError { form_fields }),
        };
        self.inner
            .apis
            .sign_up_post
            .call(
                SignUpPostInput {
                    tenant_id,
                    email: credentials.email,
                    password: credentials.password,
                },
                ctx,
            )
            .await
    }

    #[tracing::instrument(skip_all, fields(tenant_id = %tenant_id))]
    pub async fn sign_in_post(
        &self,
        tenant_id: TenantId,
        form_fields: &[FormField],
        ctx: &RequestContext,
    ) -> AuthResult<SignInPostResult> {
        let credentials = match form::validate_credentials(form_fields, false) {
            Ok(credentials) => credentials,
            Err(form_fields) => return Ok(SignInPostResult::FieldError { form_fields }),
        };
        self.inner
            .apis
            .sign_in_post
            .call(
                SignInPostInput {
                    tenant_id,
                    email: credentials.email,
                    password: credentials.password,
                },
                ctx,
            )
            .await
    }

    pub async fn email_exists_get(
        &self,
        tenant_id: TenantId,
        email: &str,
        ctx: &RequestContext,
    ) -> AuthResult<bool> {
        self.inner
            .apis
            .email_exists_get
            .call(
                EmailExistsGetInput {
                    tenant_id,
                    email: email.to_string(),
                },
                ctx,
            )
            .await
    }

    #[tracing::instrument(skip_all, fields(tenant_id = %tenant_id))]
    pub async fn generate_password_reset_token_post(
        &self,
        tenant_id: TenantId,
        form_fields: &[FormField],
        ctx: &RequestContext,
    ) -> AuthResult<GeneratePasswordResetTokenPostResult> {
        let email = match form::validate_email_field(form_fields) {
            Ok(email) => email,
            Err(form_fields) => {
                return Ok(GeneratePasswordResetTokenPostResult::FieldError { form_fields });
            }
        };
        self.inner
            .apis
            .generate_password_reset_token_post
            .call(GeneratePasswordResetTokenPostInput { tenant_id, email }, ctx)
            .await
    }

    #[tracing::instrument(skip_all, fields(tenant_id = %tenant_id))]
    pub async fn password_reset_post(
        &self,
        tenant_id: TenantId,
        token: &str,
        form_fields: &[FormField],
        ctx: &RequestContext,
    ) -> AuthResult<PasswordResetPostResult> {
        let new_password = match form::validate_password_field(form_fields) {
            Ok(password) => password,
            Err(form_fields) => return Ok(PasswordResetPostResult::FieldError { form_fields }),
        };
        self.inner
            .apis
            .password_reset_post
            .call(
                PasswordResetPostInput {
                    tenant_id,
                    token: token.to_string(),
                    new_password,
                },
                ctx,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use authkit_core::{InMemoryAccountStore, InMemoryEmailOutbox};
    use authkit_overrides::layer_fn;
    use authkit_session::{ClaimsEngine, InMemorySessionStore, SessionConfig};

    use super::*;
    use crate::api::SignUpPost;

    struct Fixture {
        recipe: EmailPasswordRecipe,
        outbox: Arc<InMemoryEmailOutbox>,
        session: SessionRecipe,
    }

    fn fixture(config: EmailPasswordConfig) -> Fixture {
        let session = SessionRecipe::new(
            SessionConfig::default(),
            ClaimsEngine::builder().build(),
            Arc::new(InMemorySessionStore::new()),
        );
        let outbox = Arc::new(InMemoryEmailOutbox::new());
        let recipe = EmailPasswordRecipe::new(
            EmailPasswordConfig {
                password_hash_cost: 4,
                ..config
            },
            EmailPasswordDeps {
                app_info: AppInfo::new("demo", "http://api.test", "http://web.test"),
                accounts: Arc::new(InMemoryAccountStore::new()),
                email_service: outbox.clone(),
                session: session.clone(),
            },
        );
        Fixture {
            recipe,
            outbox,
            session,
        }
    }

    fn credentials(email: &str, password: &str) -> Vec<FormField> {
        vec![FormField::new("email", email), FormField::new("password", password)]
    }

    fn reset_token(outbox: &InMemoryEmailOutbox) -> String {
        let sent = outbox.sent();
        let Some(EmailDeliveryInput::PasswordReset { password_reset_link, .. }) = sent.last() else {
            panic!("no reset email sent");
        };
        let query = password_reset_link.split_once("token=").unwrap().1;
        query.split('&').next().unwrap().to_string()
    }

    #[tokio::test]
    async fn sign_up_then_sign_in() {
        let f = fixture(EmailPasswordConfig::default());
        let ctx = RequestContext::new();
        let tenant = TenantId::default();

        let SignUpPostResult::Ok { user, session } = f
            .recipe
            .sign_up_post(tenant.clone(), &credentials("A@x.com", "secret123"), &ctx)
            .await
            .unwrap()
        else {
            panic!("sign-up failed");
        };
        assert_eq!(user.emails(), vec!["a@x.com"]);
        assert_eq!(session.user_id, user.id);
        assert!(f.session.get_session(session.id).await.unwrap().is_some());

        assert_eq!(
            f.recipe
                .sign_up_post(tenant.clone(), &credentials("a@x.com", "secret123"), &ctx)
                .await
                .unwrap(),
            SignUpPostResult::EmailAlreadyExists
        );

        let signed_in = f
            .recipe
            .sign_in_post(tenant.clone(), &credentials("a@x.com", "secret123"), &ctx)
            .await
            .unwrap();
        assert!(matches!(signed_in, SignInPostResult::Ok { user: ref u, .. } if u.id == user.id));

        assert_eq!(
            f.recipe
                .sign_in_post(tenant.clone(), &credentials("a@x.com", "wrong1234"), &ctx)
                .await
                .unwrap(),
            SignInPostResult::WrongCredentials
        );
        assert!(f.recipe.email_exists_get(tenant, "a@x.com", &ctx).await.unwrap());
    }

    #[tokio::test]
    async fn invalid_form_never_reaches_the_api() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let config = EmailPasswordConfig {
            apis: OverrideRegistry::new().with::<SignUpPost>(layer_fn::<SignUpPost, _, _>(
                move |inner, input, ctx| {
                    seen.fetch_add(1, Ordering::SeqCst);
                    async move { inner.call(input, &ctx).await }
                },
            )),
            ..EmailPasswordConfig::default()
        };
        let f = fixture(config);

        let result = f
            .recipe
            .sign_up_post(TenantId::default(), &credentials("not-an-email", "short"), &RequestContext::new())
            .await
            .unwrap();
        let SignUpPostResult::FieldError { form_fields } = result else {
            panic!("expected field errors");
        };
        assert_eq!(form_fields.len(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn reset_link_percent_encodes_the_tenant() {
        let f = fixture(EmailPasswordConfig::default());
        let ctx = RequestContext::new();
        let tenant = TenantId::new("acme&admin=1");
        f.recipe.sign_up(tenant.clone(), "a@x.com", "secret123", &ctx).await.unwrap();

        let email_only = vec![FormField::new("email", "a@x.com")];
        f.recipe
            .generate_password_reset_token_post(tenant.clone(), &email_only, &ctx)
            .await
            .unwrap();

        let sent = f.outbox.sent();
        let EmailDeliveryInput::PasswordReset { password_reset_link, .. } = &sent[0] else {
            panic!("wrong email kind");
        };
        assert!(password_reset_link.ends_with("&tenantId=acme%26admin%3D1"));
        assert!(!password_reset_link.contains("&admin=1"));
    }

    #[tokio::test]
    async fn password_reset_flow() {
        let f = fixture(EmailPasswordConfig::default());
        let ctx = RequestContext::new();
        let tenant = TenantId::default();
        f.recipe.sign_up(tenant.clone(), "a@x.com", "secret123", &ctx).await.unwrap();

        let email_only = vec![FormField::new("email", "a@x.com")];
        assert_eq!(
            f.recipe
                .generate_password_reset_token_post(tenant.clone(), &email_only, &ctx)
                .await
                .unwrap(),
            GeneratePasswordResetTokenPostResult::Ok
        );
        assert_eq!(f.outbox.sent().len(), 1);

        let sent = f.outbox.sent();
        let EmailDeliveryInput::PasswordReset { password_reset_link, .. } = &sent[0] else {
            panic!("wrong email kind");
        };
        assert!(password_reset_link.starts_with("http://web.test/auth/reset-password?token="));
        assert!(password_reset_link.ends_with("&tenantId=public"));

        let token = reset_token(&f.outbox);
        let new_password = vec![FormField::new("password", "newsecret456")];
        let reset = f
            .recipe
            .password_reset_post(tenant.clone(), &token, &new_password, &ctx)
            .await
            .unwrap();
        assert!(matches!(reset, PasswordResetPostResult::Ok { ref email, .. } if email == "a@x.com"));

        // Single use.
        assert_eq!(
            f.recipe
                .password_reset_post(tenant.clone(), &token, &new_password, &ctx)
                .await
                .unwrap(),
            PasswordResetPostResult::ResetPasswordInvalidToken
        );

        assert!(matches!(
            f.recipe.sign_in(tenant.clone(), "a@x.com", "newsecret456", &ctx).await.unwrap(),
            SignInResult::Ok { .. }
        ));
        assert_eq!(
            f.recipe.sign_in(tenant, "a@x.com", "secret123", &ctx).await.unwrap(),
            SignInResult::WrongCredentials
        );
    }

    #[tokio::test]
    async fn reset_for_unknown_email_is_ok_and_silent() {
        let f = fixture(EmailPasswordConfig::default());
        let result = f
            .recipe
            .generate_password_reset_token_post(
                TenantId::default(),
                &[FormField::new("email", "nobody@x.com")],
                &RequestContext::new(),
            )
            .await
            .unwrap();
        assert_eq!(result, GeneratePasswordResetTokenPostResult::Ok);
        assert!(f.outbox.sent().is_empty());
    }

    #[tokio::test]
    async fn send_email_override_replaces_delivery() {
        let intercepted = Arc::new(AtomicUsize::new(0));
        let seen = intercepted.clone();
        let config = EmailPasswordConfig {
            email_delivery: OverrideRegistry::new().with::<SendEmail>(layer_fn::<SendEmail, _, _>(
                move |_inner, _input, _ctx| {
                    seen.fetch_add(1, Ordering::SeqCst);
                    async { AuthResult::Ok(()) }
                },
            )),
            ..EmailPasswordConfig::default()
        };
        let f = fixture(config);
        let ctx = RequestContext::new();
        let tenant = TenantId::default();
        f.recipe.sign_up(tenant.clone(), "a@x.com", "secret123", &ctx).await.unwrap();

        f.recipe
            .generate_password_reset_token_post(tenant, &[FormField::new("email", "a@x.com")], &ctx)
            .await
            .unwrap();
        assert_eq!(intercepted.load(Ordering::SeqCst), 1);
        assert!(f.outbox.sent().is_empty());
    }

    #[tokio::test]
    async fn update_email_conflicts_are_reported() {
        let f = fixture(EmailPasswordConfig::default());
        let ctx = RequestContext::new();
        let tenant = TenantId::default();
        let SignUpResult::Created { user } =
            f.recipe.sign_up(tenant.clone(), "a@x.com", "secret123", &ctx).await.unwrap()
        else {
            panic!("sign-up failed");
        };
        f.recipe.sign_up(tenant, "b@x.com", "secret123", &ctx).await.unwrap();

        assert_eq!(
            f.recipe
                .update_email_or_password(user.id, Some("b@x.com"), None, &ctx)
                .await
                .unwrap(),
            UpdateEmailOrPasswordResult::EmailAlreadyExists
        );
        assert_eq!(
            f.recipe
                .update_email_or_password(UserId::new(), None, Some("x1234567"), &ctx)
                .await
                .unwrap(),
            UpdateEmailOrPasswordResult::UnknownUserId
        );
    }
}
