//! Business-logic operations of the email-password recipe.

use std::sync::Arc;

use chrono::{Duration, Utc};

use authkit_core::{
    AccountInfo, AccountStore, AuthError, AuthResult, CreateUserOutcome, LoginMethod, RequestContext,
    TenantId, UpdateUserOutcome, User, UserId, normalize_email,
};
use authkit_overrides::{Handler, Implementation, Operation, OverrideRegistry};

use crate::token::ResetTokenStore;

pub struct SignUp;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUpInput {
    pub tenant_id: TenantId,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpResult {
    Created { user: User },
    EmailAlreadyExists,
}

impl Operation for SignUp {
    const ID: &'static str = "emailpassword.sign_up";
    type Input = SignUpInput;
    type Output = AuthResult<SignUpResult>;
}

pub struct SignIn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignInInput {
    pub tenant_id: TenantId,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInResult {
    Ok { user: User },
    WrongCredentials,
}

impl Operation for SignIn {
    const ID: &'static str = "emailpassword.sign_in";
    type Input = SignInInput;
    type Output = AuthResult<SignInResult>;
}

pub struct CreateResetPasswordToken;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateResetPasswordTokenInput {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateResetPasswordTokenResult {
    Ok { token: String },
    UnknownUserId,
}

impl Operation for CreateResetPasswordToken {
    const ID: &'static str = "emailpassword.create_reset_password_token";
    type Input = CreateResetPasswordTokenInput;
    type Output = AuthResult<CreateResetPasswordTokenResult>;
}

pub struct ConsumePasswordResetToken;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumePasswordResetTokenInput {
    pub tenant_id: TenantId,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumePasswordResetTokenResult {
    Ok { user_id: UserId, email: String },
    InvalidToken,
}

impl Operation for ConsumePasswordResetToken {
    const ID: &'static str = "emailpassword.consume_password_reset_token";
    type Input = ConsumePasswordResetTokenInput;
    type Output = AuthResult<ConsumePasswordResetTokenResult>;
}

pub struct UpdateEmailOrPassword;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateEmailOrPasswordInput {
    pub user_id: UserId,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateEmailOrPasswordResult {
    Ok,
    UnknownUserId,
    EmailAlreadyExists,
}

impl Operation for UpdateEmailOrPassword {
    const ID: &'static str = "emailpassword.update_email_or_password";
    type Input = UpdateEmailOrPasswordInput;
    type Output = AuthResult<UpdateEmailOrPasswordResult>;
}

/// The resolved (fully overridden) business-logic functions.
#[derive(Clone)]
pub struct Functions {
    pub sign_up: Implementation<SignUp>,
    pub sign_in: Implementation<SignIn>,
    pub create_reset_password_token: Implementation<CreateResetPasswordToken>,
    pub consume_password_reset_token: Implementation<ConsumePasswordResetToken>,
    pub update_email_or_password: Implementation<UpdateEmailOrPassword>,
}

impl Functions {
    pub(crate) fn resolve(registry: &OverrideRegistry, base: Arc<DefaultFunctions>) -> Self {
        Self {
            sign_up: registry.resolve::<SignUp>(base.clone()),
            sign_in: registry.resolve::<SignIn>(base.clone()),
            create_reset_password_token: registry.resolve::<CreateResetPasswordToken>(base.clone()),
            consume_password_reset_token: registry.resolve::<ConsumePasswordResetToken>(base.clone()),
            update_email_or_password: registry.resolve::<UpdateEmailOrPassword>(base),
        }
    }
}

pub(crate) struct DefaultFunctions {
    pub(crate) store: Arc<dyn AccountStore>,
    pub(crate) tokens: ResetTokenStore,
    pub(crate) reset_token_ttl: Duration,
    pub(crate) password_hash_cost: u32,
}

impl DefaultFunctions {
    fn hash(&self, password: &str) -> AuthResult<String> {
        bcrypt::hash(password, self.password_hash_cost)
            .map_err(|e| AuthError::internal(format!("password hashing failed: {e}")))
    }
}

fn email_password_login<'u>(user: &'u User, tenant_id: &TenantId) -> Option<(&'u str, &'u str)> {
    user.login_methods.iter().find_map(|m| match m {
        LoginMethod::EmailPassword {
            tenant_id: t,
            email,
            password_hash,
            ..
        } if t == tenant_id => Some((email.as_str(), password_hash.as_str())),
        _ => None,
    })
}

#[async_trait::async_trait]
impl Handler<SignUp> for DefaultFunctions {
    async fn call(&self, input: SignUpInput, _ctx: &RequestContext) -> AuthResult<SignUpResult> {
        let hash = self.hash(&input.password)?;
        match self
            .store
            .create_email_password_user(&input.tenant_id, &input.email, &hash)
            .await?
        {
            CreateUserOutcome::Created(user) => {
                tracing::info!(user_id = %user.id, tenant_id = %input.tenant_id, "email-password user created");
                Ok(SignUpResult::Created { user })
            }
            CreateUserOutcome::Duplicate => Ok(SignUpResult::EmailAlreadyExists),
        }
    }
}

#[async_trait::async_trait]
impl Handler<SignIn> for DefaultFunctions {
    async fn call(&self, input: SignInInput, _ctx: &RequestContext) -> AuthResult<SignInResult> {
        let email = normalize_email(&input.email);
        let users = self
            .store
            .list_by_account_info(&input.tenant_id, &AccountInfo::email(email.clone()))
            .await?;

        for user in users {
            let Some((login_email, hash)) = email_password_login(&user, &input.tenant_id) else {
                continue;
            };
            if login_email != email {
                continue;
            }
            let ok = bcrypt::verify(&input.password, hash)
                .map_err(|e| AuthError::internal(format!("password verification failed: {e}")))?;
            if ok {
                return Ok(SignInResult::Ok { user });
            }
            break;
        }
        Ok(SignInResult::WrongCredentials)
    }
}

#[async_trait::async_trait]
impl Handler<CreateResetPasswordToken> for DefaultFunctions {
    async fn call(
        &self,
        input: CreateResetPasswordTokenInput,
        _ctx: &RequestContext,
    ) -> AuthResult<CreateResetPasswordTokenResult> {
        let Some(user) = self.store.get_user(input.user_id).await? else {
            return Ok(CreateResetPasswordTokenResult::UnknownUserId);
        };
        let email = normalize_email(&input.email);
        let owns_email = email_password_login(&user, &input.tenant_id)
            .is_some_and(|(login_email, _)| login_email == email);
        if !owns_email {
            return Ok(CreateResetPasswordTokenResult::UnknownUserId);
        }

        let token = self.tokens.issue(
            &input.tenant_id,
            input.user_id,
            &email,
            self.reset_token_ttl,
            Utc::now(),
        )?;
        Ok(CreateResetPasswordTokenResult::Ok { token })
    }
}

#[async_trait::async_trait]
impl Handler<ConsumePasswordResetToken> for DefaultFunctions {
    async fn call(
        &self,
        input: ConsumePasswordResetTokenInput,
        _ctx: &RequestContext,
    ) -> AuthResult<ConsumePasswordResetTokenResult> {
        match self.tokens.consume(&input.tenant_id, &input.token, Utc::now())? {
            Some(consumed) => Ok(ConsumePasswordResetTokenResult::Ok {
                user_id: consumed.user_id,
                email: consumed.email,
            }),
            None => Ok(ConsumePasswordResetTokenResult::InvalidToken),
        }
    }
}

#[async_trait::async_trait]
impl Handler<UpdateEmailOrPassword> for DefaultFunctions {
    async fn call(
        &self,
        input: UpdateEmailOrPasswordInput,
        _ctx: &RequestContext,
    ) -> AuthResult<UpdateEmailOrPasswordResult> {
        let hash = match &input.password {
            Some(password) => Some(self.hash(password)?),
            None => None,
        };
        let outcome = self
            .store
            .update_email_password(input.user_id, input.email.as_deref(), hash.as_deref())
            .await?;
        Ok(match outcome {
            UpdateUserOutcome::Updated(_) => UpdateEmailOrPasswordResult::Ok,
            UpdateUserOutcome::UnknownUser => UpdateEmailOrPasswordResult::UnknownUserId,
            UpdateUserOutcome::EmailTaken => UpdateEmailOrPasswordResult::EmailAlreadyExists,
        })
    }
}
