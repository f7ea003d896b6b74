use std::sync::Arc;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use authkit_core::{
    AccountStore, AppInfo, AuthResult, EmailDeliveryInput, EmailDeliveryService, RequestContext,
    TenantId, UserId,
};
use authkit_overrides::{Implementation, OverrideRegistry};
use authkit_session::{BooleanClaim, Session, SessionRecipe, Validator};

use crate::api::{Apis, DefaultApis, GenerateEmailVerifyTokenPostResult, VerifyEmailPostInput, VerifyEmailPostResult};
use crate::claim::email_verification_claim;
use crate::delivery::{DefaultSendEmail, SendEmail};
use crate::functions::{
    CreateEmailVerificationTokenInput, CreateEmailVerificationTokenResult, DefaultFunctions,
    EmailOfUser, Functions, VerifyEmailUsingTokenInput, VerifyEmailUsingTokenResult,
};
use crate::store::VerificationStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailVerificationMode {
    /// Every session verification requires `st-ev` to be true.
    Required,
    /// The claim is kept up to date, but not enforced globally.
    #[default]
    Optional,
}

pub struct EmailVerificationConfig {
    pub mode: EmailVerificationMode,
    pub functions: OverrideRegistry,
    pub apis: OverrideRegistry,
    pub email_delivery: OverrideRegistry,
    pub token_ttl: Duration,
}

impl Default for EmailVerificationConfig {
    fn default() -> Self {
        Self {
            mode: EmailVerificationMode::default(),
            functions: OverrideRegistry::new(),
            apis: OverrideRegistry::new(),
            email_delivery: OverrideRegistry::new(),
            token_ttl: Duration::days(1),
        }
    }
}

#[derive(Clone)]
pub struct EmailVerificationDeps {
    pub app_info: AppInfo,
    pub email_service: Arc<dyn EmailDeliveryService>,
    pub session: SessionRecipe,
}

/// First initialisation phase: functions are resolved and the `st-ev` claim exists,
/// so it can be registered with the claims engine before the session recipe is built.
pub struct EmailVerificationInit {
    mode: EmailVerificationMode,
    apis: OverrideRegistry,
    email_delivery: OverrideRegistry,
    functions: Functions,
    accounts: Arc<dyn AccountStore>,
    claim: BooleanClaim,
}

impl EmailVerificationInit {
    pub fn mode(&self) -> EmailVerificationMode {
        self.mode
    }

    pub fn claim(&self) -> &BooleanClaim {
        &self.claim
    }

    /// Global validators this recipe contributes.
    pub fn global_validators(&self) -> Vec<Validator> {
        match self.mode {
            EmailVerificationMode::Required => vec![self.claim.is_true()],
            EmailVerificationMode::Optional => Vec::new(),
        }
    }

    pub fn build(self, deps: EmailVerificationDeps) -> EmailVerificationRecipe {
        let send_email = self.email_delivery.resolve::<SendEmail>(Arc::new(DefaultSendEmail {
            service: deps.email_service,
        }));
        let apis = Apis::resolve(
            &self.apis,
            Arc::new(DefaultApis {
                functions: self.functions.clone(),
                send_email: send_email.clone(),
                session: deps.session,
                accounts: self.accounts,
                app_info: deps.app_info,
            }),
        );

        tracing::debug!(
            mode = ?self.mode,
            api_overrides = ?self.apis.operation_ids(),
            "email-verification recipe initialised"
        );
        EmailVerificationRecipe {
            inner: Arc::new(Inner {
                mode: self.mode,
                functions: self.functions,
                apis,
                send_email,
                claim: self.claim,
            }),
        }
    }
}

struct Inner {
    mode: EmailVerificationMode,
    functions: Functions,
    apis: Apis,
    send_email: Implementation<SendEmail>,
    claim: BooleanClaim,
}

#[derive(Clone)]
pub struct EmailVerificationRecipe {
    inner: Arc<Inner>,
}

impl EmailVerificationRecipe {
    pub fn init(config: EmailVerificationConfig, accounts: Arc<dyn AccountStore>) -> EmailVerificationInit {
        let functions = Functions::resolve(
            &config.functions,
            Arc::new(DefaultFunctions {
                store: VerificationStore::new(),
                token_ttl: config.token_ttl,
            }),
        );
        let claim = email_verification_claim(functions.clone(), accounts.clone());
        EmailVerificationInit {
            mode: config.mode,
            apis: config.apis,
            email_delivery: config.email_delivery,
            functions,
            accounts,
            claim,
        }
    }

    pub fn mode(&self) -> EmailVerificationMode {
        self.inner.mode
    }

    pub fn claim(&self) -> &BooleanClaim {
        &self.inner.claim
    }

    pub fn functions(&self) -> &Functions {
        &self.inner.functions
    }

    pub fn apis(&self) -> &Apis {
        &self.inner.apis
    }

    pub async fn create_email_verification_token(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        email: &str,
        ctx: &RequestContext,
    ) -> AuthResult<CreateEmailVerificationTokenResult> {
        self.inner
            .functions
            .create_email_verification_token
            .call(
                CreateEmailVerificationTokenInput {
                    tenant_id,
                    user_id,
                    email: email.to_string(),
                },
                ctx,
            )
            .await
    }

    pub async fn verify_email_using_token(
        &self,
        tenant_id: TenantId,
        token: &str,
        ctx: &RequestContext,
    ) -> AuthResult<VerifyEmailUsingTokenResult> {
        self.inner
            .functions
            .verify_email_using_token
            .call(
                VerifyEmailUsingTokenInput {
                    tenant_id,
                    token: token.to_string(),
                },
                ctx,
            )
            .await
    }

    pub async fn is_email_verified(
        &self,
        user_id: UserId,
        email: &str,
        ctx: &RequestContext,
    ) -> AuthResult<bool> {
        self.inner
            .functions
            .is_email_verified
            .call(
                EmailOfUser {
                    user_id,
                    email: email.to_string(),
                },
                ctx,
            )
            .await
    }

    pub async fn unverify_email(
        &self,
        user_id: UserId,
        email: &str,
        ctx: &RequestContext,
    ) -> AuthResult<()> {
        self.inner
            .functions
            .unverify_email
            .call(
                EmailOfUser {
                    user_id,
                    email: email.to_string(),
                },
                ctx,
            )
            .await
    }

    /// Verify without sending anything, e.g. when a provider vouches for the email.
    pub async fn mark_email_as_verified(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        email: &str,
        ctx: &RequestContext,
    ) -> AuthResult<()> {
        let token = match self
            .create_email_verification_token(tenant_id.clone(), user_id, email, ctx)
            .await?
        {
            CreateEmailVerificationTokenResult::Ok { token } => token,
            CreateEmailVerificationTokenResult::EmailAlreadyVerified => return Ok(()),
        };
        self.verify_email_using_token(tenant_id, &token, ctx).await?;
        Ok(())
    }

    pub async fn send_email(&self, input: EmailDeliveryInput, ctx: &RequestContext) -> AuthResult<()> {
        self.inner.send_email.call(input, ctx).await
    }

    #[tracing::instrument(skip_all, fields(session_id = %session.id))]
    pub async fn generate_email_verify_token_post(
        &self,
        session: Session,
        ctx: &RequestContext,
    ) -> AuthResult<GenerateEmailVerifyTokenPostResult> {
        self.inner
            .apis
            .generate_email_verify_token_post
            .call(session, ctx)
            .await
    }

    #[tracing::instrument(skip_all, fields(tenant_id = %tenant_id))]
    pub async fn verify_email_post(
        &self,
        tenant_id: TenantId,
        token: &str,
        session: Option<Session>,
        ctx: &RequestContext,
    ) -> AuthResult<VerifyEmailPostResult> {
        self.inner
            .apis
            .verify_email_post
            .call(
                VerifyEmailPostInput {
                    tenant_id,
                    token: token.to_string(),
                    session,
                },
                ctx,
            )
            .await
    }

    pub async fn is_email_verified_get(&self, session: Session, ctx: &RequestContext) -> AuthResult<bool> {
        self.inner.apis.is_email_verified_get.call(session, ctx).await
    }
}
