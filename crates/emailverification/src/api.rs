//! API-level operations of the email-verification recipe.

use std::sync::Arc;

use authkit_core::{
    AccountStore, AppInfo, AuthError, AuthResult, EmailDeliveryInput, RequestContext, TenantId,
    UserId,
};
use authkit_overrides::{Handler, Implementation, Operation, OverrideRegistry};
use authkit_session::{ClaimId, Session, SessionError, SessionRecipe};

use crate::claim::{EMAIL_VERIFICATION_CLAIM_ID, email_for_tenant};
use crate::delivery::SendEmail;
use crate::functions::{
    CreateEmailVerificationTokenInput, CreateEmailVerificationTokenResult, EmailOfUser, Functions,
    VerifyEmailUsingTokenInput, VerifyEmailUsingTokenResult,
};

pub struct GenerateEmailVerifyTokenPost;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerateEmailVerifyTokenPostResult {
    Ok,
    EmailAlreadyVerified,
}

impl Operation for GenerateEmailVerifyTokenPost {
    const ID: &'static str = "emailverification.api.generate_email_verify_token_post";
    type Input = Session;
    type Output = AuthResult<GenerateEmailVerifyTokenPostResult>;
}

pub struct VerifyEmailPost;

#[derive(Debug, Clone, PartialEq)]
pub struct VerifyEmailPostInput {
    pub tenant_id: TenantId,
    pub token: String,
    /// When present and owned by the verified user, its `st-ev` claim is refreshed.
    pub session: Option<Session>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyEmailPostResult {
    Ok { user_id: UserId, email: String },
    EmailVerificationInvalidToken,
}

impl Operation for VerifyEmailPost {
    const ID: &'static str = "emailverification.api.verify_email_post";
    type Input = VerifyEmailPostInput;
    type Output = AuthResult<VerifyEmailPostResult>;
}

pub struct IsEmailVerifiedGet;

impl Operation for IsEmailVerifiedGet {
    const ID: &'static str = "emailverification.api.is_email_verified_get";
    type Input = Session;
    type Output = AuthResult<bool>;
}

#[derive(Clone)]
pub struct Apis {
    pub generate_email_verify_token_post: Implementation<GenerateEmailVerifyTokenPost>,
    pub verify_email_post: Implementation<VerifyEmailPost>,
    pub is_email_verified_get: Implementation<IsEmailVerifiedGet>,
}

impl Apis {
    pub(crate) fn resolve(registry: &OverrideRegistry, base: Arc<DefaultApis>) -> Self {
        Self {
            generate_email_verify_token_post: registry
                .resolve::<GenerateEmailVerifyTokenPost>(base.clone()),
            verify_email_post: registry.resolve::<VerifyEmailPost>(base.clone()),
            is_email_verified_get: registry.resolve::<IsEmailVerifiedGet>(base),
        }
    }
}

pub(crate) struct DefaultApis {
    pub(crate) functions: Functions,
    pub(crate) send_email: Implementation<SendEmail>,
    pub(crate) session: SessionRecipe,
    pub(crate) accounts: Arc<dyn AccountStore>,
    pub(crate) app_info: AppInfo,
}

fn session_fault(err: SessionError) -> AuthError {
    match err {
        SessionError::Auth(e) => e,
        SessionError::ClaimRefresh(e) => e.source,
        other => AuthError::internal(other.to_string()),
    }
}

impl DefaultApis {
    async fn session_email(&self, session: &Session) -> AuthResult<Option<String>> {
        let Some(user) = self.accounts.get_user(session.user_id).await? else {
            return Err(AuthError::unknown_user(session.user_id.to_string()));
        };
        Ok(email_for_tenant(&user, &session.tenant_id).map(str::to_string))
    }

    async fn refresh_claim(&self, mut session: Session, ctx: &RequestContext) -> AuthResult<()> {
        let claim_id = ClaimId::new(EMAIL_VERIFICATION_CLAIM_ID);
        match self.session.fetch_and_set_claim(&mut session, &claim_id, ctx).await {
            Ok(()) => Ok(()),
            // Signed out concurrently; nothing to refresh.
            Err(SessionError::Unauthorised) => Ok(()),
            Err(e) => Err(session_fault(e)),
        }
    }
}

#[async_trait::async_trait]
impl Handler<GenerateEmailVerifyTokenPost> for DefaultApis {
    async fn call(
        &self,
        session: Session,
        ctx: &RequestContext,
    ) -> AuthResult<GenerateEmailVerifyTokenPostResult> {
        let Some(email) = self.session_email(&session).await? else {
            self.refresh_claim(session, ctx).await?;
            return Ok(GenerateEmailVerifyTokenPostResult::EmailAlreadyVerified);
        };

        let created = self
            .functions
            .create_email_verification_token
            .call(
                CreateEmailVerificationTokenInput {
                    tenant_id: session.tenant_id.clone(),
                    user_id: session.user_id,
                    email: email.clone(),
                },
                ctx,
            )
            .await?;
        let token = match created {
            CreateEmailVerificationTokenResult::Ok { token } => token,
            CreateEmailVerificationTokenResult::EmailAlreadyVerified => {
                self.refresh_claim(session, ctx).await?;
                return Ok(GenerateEmailVerifyTokenPostResult::EmailAlreadyVerified);
            }
        };

        let link = self
            .app_info
            .token_link("verify-email", &token, &session.tenant_id);
        self.send_email
            .call(
                EmailDeliveryInput::EmailVerification {
                    tenant_id: session.tenant_id.clone(),
                    user_id: session.user_id,
                    email,
                    email_verify_link: link,
                },
                ctx,
            )
            .await?;
        Ok(GenerateEmailVerifyTokenPostResult::Ok)
    }
}

#[async_trait::async_trait]
impl Handler<VerifyEmailPost> for DefaultApis {
    async fn call(
        &self,
        input: VerifyEmailPostInput,
        ctx: &RequestContext,
    ) -> AuthResult<VerifyEmailPostResult> {
        let result = self
            .functions
            .verify_email_using_token
            .call(
                VerifyEmailUsingTokenInput {
                    tenant_id: input.tenant_id,
                    token: input.token,
                },
                ctx,
            )
            .await?;

        match result {
            VerifyEmailUsingTokenResult::InvalidToken => {
                Ok(VerifyEmailPostResult::EmailVerificationInvalidToken)
            }
            VerifyEmailUsingTokenResult::Ok { user_id, email } => {
                if let Some(session) = input.session.filter(|s| s.user_id == user_id) {
                    self.refresh_claim(session, ctx).await?;
                }
                Ok(VerifyEmailPostResult::Ok { user_id, email })
            }
        }
    }
}

#[async_trait::async_trait]
impl Handler<IsEmailVerifiedGet> for DefaultApis {
    async fn call(&self, session: Session, ctx: &RequestContext) -> AuthResult<bool> {
        let verified = match self.session_email(&session).await? {
            None => true,
            Some(email) => {
                self.functions
                    .is_email_verified
                    .call(
                        EmailOfUser {
                            user_id: session.user_id,
                            email,
                        },
                        ctx,
                    )
                    .await?
            }
        };
        self.refresh_claim(session, ctx).await?;
        Ok(verified)
    }
}
