//! API-level operations: what the transport calls after parsing a request.
//!
//! Form fields are validated before these run, so inputs are already well-formed.

use std::sync::Arc;

use authkit_core::{
    AccountInfo, AccountStore, AppInfo, AuthError, AuthResult, EmailDeliveryInput, RequestContext,
    TenantId, User, UserId, normalize_email,
};
use authkit_overrides::{Handler, Implementation, Operation, OverrideRegistry};
use authkit_session::{Session, SessionRecipe};

use crate::delivery::SendEmail;
use crate::form::FieldError;
use crate::functions::{
    ConsumePasswordResetTokenInput, ConsumePasswordResetTokenResult, CreateResetPasswordTokenInput,
    CreateResetPasswordTokenResult, Functions, SignInInput, SignInResult, SignUpInput, SignUpResult,
    UpdateEmailOrPasswordInput, UpdateEmailOrPasswordResult,
};

pub struct SignUpPost;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUpPostInput {
    pub tenant_id: TenantId,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SignUpPostResult {
    Ok { user: User, session: Session },
    EmailAlreadyExists,
    FieldError { form_fields: Vec<FieldError> },
}

impl Operation for SignUpPost {
    const ID: &'static str = "emailpassword.api.sign_up_post";
    type Input = SignUpPostInput;
    type Output = AuthResult<SignUpPostResult>;
}

pub struct SignInPost;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignInPostInput {
    pub tenant_id: TenantId,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SignInPostResult {
    Ok { user: User, session: Session },
    WrongCredentials,
    FieldError { form_fields: Vec<FieldError> },
}

impl Operation for SignInPost {
    const ID: &'static str = "emailpassword.api.sign_in_post";
    type Input = SignInPostInput;
    type Output = AuthResult<SignInPostResult>;
}

pub struct EmailExistsGet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailExistsGetInput {
    pub tenant_id: TenantId,
    pub email: String,
}

impl Operation for EmailExistsGet {
    const ID: &'static str = "emailpassword.api.email_exists_get";
    type Input = EmailExistsGetInput;
    type Output = AuthResult<bool>;
}

pub struct GeneratePasswordResetTokenPost;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratePasswordResetTokenPostInput {
    pub tenant_id: TenantId,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratePasswordResetTokenPostResult {
    /// Returned whether or not the email belongs to anyone.
    Ok,
    FieldError { form_fields: Vec<FieldError> },
}

impl Operation for GeneratePasswordResetTokenPost {
    const ID: &'static str = "emailpassword.api.generate_password_reset_token_post";
    type Input = GeneratePasswordResetTokenPostInput;
    type Output = AuthResult<GeneratePasswordResetTokenPostResult>;
}

pub struct PasswordResetPost;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordResetPostInput {
    pub tenant_id: TenantId,
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasswordResetPostResult {
    Ok { user_id: UserId, email: String },
    ResetPasswordInvalidToken,
    FieldError { form_fields: Vec<FieldError> },
}

impl Operation for PasswordResetPost {
    const ID: &'static str = "emailpassword.api.password_reset_post";
    type Input = PasswordResetPostInput;
    type Output = AuthResult<PasswordResetPostResult>;
}

#[derive(Clone)]
pub struct Apis {
    pub sign_up_post: Implementation<SignUpPost>,
    pub sign_in_post: Implementation<SignInPost>,
    pub email_exists_get: Implementation<EmailExistsGet>,
    pub generate_password_reset_token_post: Implementation<GeneratePasswordResetTokenPost>,
    pub password_reset_post: Implementation<PasswordResetPost>,
}

impl Apis {
    pub(crate) fn resolve(registry: &OverrideRegistry, base: Arc<DefaultApis>) -> Self {
        Self {
            sign_up_post: registry.resolve::<SignUpPost>(base.clone()),
            sign_in_post: registry.resolve::<SignInPost>(base.clone()),
            email_exists_get: registry.resolve::<EmailExistsGet>(base.clone()),
            generate_password_reset_token_post: registry
                .resolve::<GeneratePasswordResetTokenPost>(base.clone()),
            password_reset_post: registry.resolve::<PasswordResetPost>(base),
        }
    }
}

pub(crate) struct DefaultApis {
    pub(crate) functions: Functions,
    pub(crate) send_email: Implementation<SendEmail>,
    pub(crate) session: SessionRecipe,
    pub(crate) store: Arc<dyn AccountStore>,
    pub(crate) app_info: AppInfo,
}

#[async_trait::async_trait]
impl Handler<SignUpPost> for DefaultApis {
    async fn call(&self, input: SignUpPostInput, ctx: &RequestContext) -> AuthResult<SignUpPostResult> {
        let tenant_id = input.tenant_id.clone();
        let result = self
            .functions
            .sign_up
            .call(
                SignUpInput {
                    tenant_id: input.tenant_id,
                    email: input.email,
                    password: input.password,
                },
                ctx,
            )
            .await?;

        match result {
            SignUpResult::EmailAlreadyExists => Ok(SignUpPostResult::EmailAlreadyExists),
            SignUpResult::Created { user } => {
                let session = self.session.create_new_session(user.id, tenant_id, ctx).await?;
                Ok(SignUpPostResult::Ok { user, session })
            }
        }
    }
}

#[async_trait::async_trait]
impl Handler<SignInPost> for DefaultApis {
    async fn call(&self, input: SignInPostInput, ctx: &RequestContext) -> AuthResult<SignInPostResult> {
        let tenant_id = input.tenant_id.clone();
        let result = self
            .functions
            .sign_in
            .call(
                SignInInput {
                    tenant_id: input.tenant_id,
                    email: input.email,
                    password: input.password,
                },
                ctx,
            )
            .await?;

        match result {
            SignInResult::WrongCredentials => Ok(SignInPostResult::WrongCredentials),
            SignInResult::Ok { user } => {
                let session = self.session.create_new_session(user.id, tenant_id, ctx).await?;
                Ok(SignInPostResult::Ok { user, session })
            }
        }
    }
}

#[async_trait::async_trait]
impl Handler<EmailExistsGet> for DefaultApis {
    async fn call(&self, input: EmailExistsGetInput, _ctx: &RequestContext) -> AuthResult<bool> {
        let email = normalize_email(&input.email);
        let users = self
            .store
            .list_by_account_info(&input.tenant_id, &AccountInfo::email(email.clone()))
            .await?;
        Ok(users.iter().flat_map(|u| &u.login_methods).any(|m| {
            m.is_email_password() && *m.tenant_id() == input.tenant_id && m.email() == email
        }))
    }
}

#[async_trait::async_trait]
impl Handler<GeneratePasswordResetTokenPost> for DefaultApis {
    async fn call(
        &self,
        input: GeneratePasswordResetTokenPostInput,
        ctx: &RequestContext,
    ) -> AuthResult<GeneratePasswordResetTokenPostResult> {
        let email = normalize_email(&input.email);
        let users = self
            .store
            .list_by_account_info(&input.tenant_id, &AccountInfo::email(email.clone()))
            .await?;
        let owner = users.into_iter().find(|u| {
            u.login_methods.iter().any(|m| {
                m.is_email_password() && *m.tenant_id() == input.tenant_id && m.email() == email
            })
        });

        let Some(user) = owner else {
            tracing::debug!(tenant_id = %input.tenant_id, "password reset requested for unknown email");
            return Ok(GeneratePasswordResetTokenPostResult::Ok);
        };

        let created = self
            .functions
            .create_reset_password_token
            .call(
                CreateResetPasswordTokenInput {
                    tenant_id: input.tenant_id.clone(),
                    user_id: user.id,
                    email: email.clone(),
                },
                ctx,
            )
            .await?;
        let token = match created {
            CreateResetPasswordTokenResult::Ok { token } => token,
            CreateResetPasswordTokenResult::UnknownUserId => {
                tracing::debug!(user_id = %user.id, "user vanished before token creation");
                return Ok(GeneratePasswordResetTokenPostResult::Ok);
            }
        };

        let link = self
            .app_info
            .token_link("reset-password", &token, &input.tenant_id);
        self.send_email
            .call(
                EmailDeliveryInput::PasswordReset {
                    tenant_id: input.tenant_id,
                    user_id: user.id,
                    email,
                    password_reset_link: link,
                },
                ctx,
            )
            .await?;
        Ok(GeneratePasswordResetTokenPostResult::Ok)
    }
}

#[async_trait::async_trait]
impl Handler<PasswordResetPost> for DefaultApis {
    async fn call(
        &self,
        input: PasswordResetPostInput,
        ctx: &RequestContext,
    ) -> AuthResult<PasswordResetPostResult> {
        let consumed = self
            .functions
            .consume_password_reset_token
            .call(
                ConsumePasswordResetTokenInput {
                    tenant_id: input.tenant_id,
                    token: input.token,
                },
                ctx,
            )
            .await?;
        let (user_id, email) = match consumed {
            ConsumePasswordResetTokenResult::Ok { user_id, email } => (user_id, email),
            ConsumePasswordResetTokenResult::InvalidToken => {
                return Ok(PasswordResetPostResult::ResetPasswordInvalidToken);
            }
        };

        let updated = self
            .functions
            .update_email_or_password
            .call(
                UpdateEmailOrPasswordInput {
                    user_id,
                    email: None,
                    password: Some(input.new_password),
                },
                ctx,
            )
            .await?;
        match updated {
            UpdateEmailOrPasswordResult::Ok => {
                tracing::info!(user_id = %user_id, "password reset");
                Ok(PasswordResetPostResult::Ok { user_id, email })
            }
            UpdateEmailOrPasswordResult::UnknownUserId => {
                Ok(PasswordResetPostResult::ResetPasswordInvalidToken)
            }
            UpdateEmailOrPasswordResult::EmailAlreadyExists => Err(AuthError::internal(
                "email conflict while only the password was updated",
            )),
        }
    }
}
