use std::sync::Arc;

use chrono::{Duration, Utc};

use authkit_core::{AuthResult, RequestContext, TenantId, UserId, normalize_email};
use authkit_overrides::{Handler, Implementation, Operation, OverrideRegistry};

use crate::store::VerificationStore;

pub struct CreateEmailVerificationToken;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateEmailVerificationTokenInput {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateEmailVerificationTokenResult {
    Ok { token: String },
    EmailAlreadyVerified,
}

impl Operation for CreateEmailVerificationToken {
    const ID: &'static str = "emailverification.create_email_verification_token";
    type Input = CreateEmailVerificationTokenInput;
    type Output = AuthResult<CreateEmailVerificationTokenResult>;
}

pub struct VerifyEmailUsingToken;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyEmailUsingTokenInput {
    pub tenant_id: TenantId,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyEmailUsingTokenResult {
    Ok { user_id: UserId, email: String },
    InvalidToken,
}

impl Operation for VerifyEmailUsingToken {
    const ID: &'static str = "emailverification.verify_email_using_token";
    type Input = VerifyEmailUsingTokenInput;
    type Output = AuthResult<VerifyEmailUsingTokenResult>;
}

pub struct IsEmailVerified;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailOfUser {
    pub user_id: UserId,
    pub email: String,
}

impl Operation for IsEmailVerified {
    const ID: &'static str = "emailverification.is_email_verified";
    type Input = EmailOfUser;
    type Output = AuthResult<bool>;
}

pub struct UnverifyEmail;

impl Operation for UnverifyEmail {
    const ID: &'static str = "emailverification.unverify_email";
    type Input = EmailOfUser;
    type Output = AuthResult<()>;
}

#[derive(Clone)]
pub struct Functions {
    pub create_email_verification_token: Implementation<CreateEmailVerificationToken>,
    pub verify_email_using_token: Implementation<VerifyEmailUsingToken>,
    pub is_email_verified: Implementation<IsEmailVerified>,
    pub unverify_email: Implementation<UnverifyEmail>,
}

impl Functions {
    pub(crate) fn resolve(registry: &OverrideRegistry, base: Arc<DefaultFunctions>) -> Self {
        Self {
            create_email_verification_token: registry
                .resolve::<CreateEmailVerificationToken>(base.clone()),
            verify_email_using_token: registry.resolve::<VerifyEmailUsingToken>(base.clone()),
            is_email_verified: registry.resolve::<IsEmailVerified>(base.clone()),
            unverify_email: registry.resolve::<UnverifyEmail>(base),
        }
    }
}

pub(crate) struct DefaultFunctions {
    pub(crate) store: VerificationStore,
    pub(crate) token_ttl: Duration,
}

#[async_trait::async_trait]
impl Handler<CreateEmailVerificationToken> for DefaultFunctions {
    async fn call(
        &self,
        input: CreateEmailVerificationTokenInput,
        _ctx: &RequestContext,
    ) -> AuthResult<CreateEmailVerificationTokenResult> {
        let email = normalize_email(&input.email);
        if self.store.is_verified(input.user_id, &email)? {
            return Ok(CreateEmailVerificationTokenResult::EmailAlreadyVerified);
        }
        let token = self
            .store
            .issue(&input.tenant_id, input.user_id, &email, self.token_ttl, Utc::now())?;
        Ok(CreateEmailVerificationTokenResult::Ok { token })
    }
}

#[async_trait::async_trait]
impl Handler<VerifyEmailUsingToken> for DefaultFunctions {
    async fn call(
        &self,
        input: VerifyEmailUsingTokenInput,
        _ctx: &RequestContext,
    ) -> AuthResult<VerifyEmailUsingTokenResult> {
        match self.store.consume(&input.tenant_id, &input.token, Utc::now())? {
            Some((user_id, email)) => {
                tracing::info!(user_id = %user_id, "email verified");
                Ok(VerifyEmailUsingTokenResult::Ok { user_id, email })
            }
            None => Ok(VerifyEmailUsingTokenResult::InvalidToken),
        }
    }
}

#[async_trait::async_trait]
impl Handler<IsEmailVerified> for DefaultFunctions {
    async fn call(&self, input: EmailOfUser, _ctx: &RequestContext) -> AuthResult<bool> {
        self.store
            .is_verified(input.user_id, &normalize_email(&input.email))
    }
}

#[async_trait::async_trait]
impl Handler<UnverifyEmail> for DefaultFunctions {
    async fn call(&self, input: EmailOfUser, _ctx: &RequestContext) -> AuthResult<()> {
        self.store.unverify(input.user_id, &normalize_email(&input.email))
    }
}
