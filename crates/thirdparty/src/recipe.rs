use std::sync::Arc;

use authkit_core::{AccountStore, AuthResult, RequestContext, TenantId, ThirdPartyInfo};
use authkit_emailverification::EmailVerificationRecipe;
use authkit_overrides::OverrideRegistry;
use authkit_session::SessionRecipe;

use crate::api::{Apis, DefaultApis, SignInUpPostInput, SignInUpPostResult};
use crate::functions::{DefaultFunctions, Functions, SignInUpInput, SignInUpResult};

#[derive(Default)]
pub struct ThirdPartyConfig {
    pub functions: OverrideRegistry,
    pub apis: OverrideRegistry,
}

#[derive(Clone)]
pub struct ThirdPartyDeps {
    pub accounts: Arc<dyn AccountStore>,
    pub session: SessionRecipe,
    /// When present, provider-verified emails are marked verified at sign-in.
    pub email_verification: Option<EmailVerificationRecipe>,
}

struct Inner {
    functions: Functions,
    apis: Apis,
}

#[derive(Clone)]
pub struct ThirdPartyRecipe {
    inner: Arc<Inner>,
}

impl ThirdPartyRecipe {
    pub fn new(config: ThirdPartyConfig, deps: ThirdPartyDeps) -> Self {
        let functions = Functions::resolve(
            &config.functions,
            Arc::new(DefaultFunctions {
                accounts: deps.accounts,
            }),
        );
        let apis = Apis::resolve(
            &config.apis,
            Arc::new(DefaultApis {
                functions: functions.clone(),
                session: deps.session,
                email_verification: deps.email_verification,
            }),
        );
        tracing::debug!(
            function_overrides = ?config.functions.operation_ids(),
            api_overrides = ?config.apis.operation_ids(),
            "third-party recipe initialised"
        );
        Self {
            inner: Arc::new(Inner { functions, apis }),
        }
    }

    pub fn functions(&self) -> &Functions {
        &self.inner.functions
    }

    pub fn apis(&self) -> &Apis {
        &self.inner.apis
    }

    pub async fn sign_in_up(
        &self,
        tenant_id: TenantId,
        third_party: ThirdPartyInfo,
        email: &str,
        ctx: &RequestContext,
    ) -> AuthResult<SignInUpResult> {
        self.inner
            .functions
            .sign_in_up
            .call(
                SignInUpInput {
                    tenant_id,
                    third_party,
                    email: email.to_string(),
                },
                ctx,
            )
            .await
    }

    #[tracing::instrument(skip_all, fields(tenant_id = %input.tenant_id, third_party_id = %input.third_party.third_party_id))]
    pub async fn sign_in_up_post(
        &self,
        input: SignInUpPostInput,
        ctx: &RequestContext,
    ) -> AuthResult<SignInUpPostResult> {
        self.inner.apis.sign_in_up_post.call(input, ctx).await
    }
}
