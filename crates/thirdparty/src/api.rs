use std::sync::Arc;

use authkit_core::{AuthResult, RequestContext, TenantId, ThirdPartyInfo, User};
use authkit_emailverification::EmailVerificationRecipe;
use authkit_overrides::{Handler, Implementation, Operation, OverrideRegistry};
use authkit_session::{Session, SessionRecipe};

use crate::functions::{Functions, SignInUpInput, SignInUpResult};

pub const SIGN_IN_UP_NOT_ALLOWED_REASON: &str =
    "Cannot sign in / up due to security reasons. Please try a different login method or contact support.";

/// User info already verified with the provider (code exchange happens upstream).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignInUpPostInput {
    pub tenant_id: TenantId,
    pub third_party: ThirdPartyInfo,
    pub email: String,
    pub email_verified: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SignInUpPostResult {
    Ok {
        user: User,
        created_new_user: bool,
        session: Session,
    },
    SignInUpNotAllowed {
        reason: String,
    },
    GeneralError {
        message: String,
    },
}

pub struct SignInUpPost;

impl Operation for SignInUpPost {
    const ID: &'static str = "thirdparty.api.sign_in_up_post";
    type Input = SignInUpPostInput;
    type Output = AuthResult<SignInUpPostResult>;
}

#[derive(Clone)]
pub struct Apis {
    pub sign_in_up_post: Implementation<SignInUpPost>,
}

impl Apis {
    pub(crate) fn resolve(registry: &OverrideRegistry, base: Arc<DefaultApis>) -> Self {
        Self {
            sign_in_up_post: registry.resolve::<SignInUpPost>(base),
        }
    }
}

pub(crate) struct DefaultApis {
    pub(crate) functions: Functions,
    pub(crate) session: SessionRecipe,
    pub(crate) email_verification: Option<EmailVerificationRecipe>,
}

#[async_trait::async_trait]
impl Handler<SignInUpPost> for DefaultApis {
    async fn call(
        &self,
        input: SignInUpPostInput,
        ctx: &RequestContext,
    ) -> AuthResult<SignInUpPostResult> {
        let result = self
            .functions
            .sign_in_up
            .call(
                SignInUpInput {
                    tenant_id: input.tenant_id.clone(),
                    third_party: input.third_party,
                    email: input.email.clone(),
                },
                ctx,
            )
            .await?;

        let (user, created_new_user) = match result {
            SignInUpResult::Created { user } => (user, true),
            SignInUpResult::SignedIn { user } => (user, false),
            SignInUpResult::EmailAlreadyUsed { email } => {
                tracing::warn!(email = %email, "third-party sign-in/up refused");
                return Ok(SignInUpPostResult::SignInUpNotAllowed {
                    reason: SIGN_IN_UP_NOT_ALLOWED_REASON.to_string(),
                });
            }
        };

        if input.email_verified {
            if let Some(ev) = &self.email_verification {
                ev.mark_email_as_verified(input.tenant_id.clone(), user.id, &input.email, ctx)
                    .await?;
            }
        }

        let session = self
            .session
            .create_new_session(user.id, input.tenant_id, ctx)
            .await?;
        Ok(SignInUpPostResult::Ok {
            user,
            created_new_user,
            session,
        })
    }
}
