use std::sync::Arc;

use authkit_core::{
    AccountInfo, AccountStore, AuthError, AuthResult, CreateUserOutcome, RequestContext, TenantId,
    ThirdPartyInfo, UpdateUserOutcome, User, normalize_email,
};
use authkit_overrides::{Handler, Implementation, Operation, OverrideRegistry};

pub struct SignInUp;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignInUpInput {
    pub tenant_id: TenantId,
    pub third_party: ThirdPartyInfo,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInUpResult {
    Created { user: User },
    SignedIn { user: User },
    /// Refused because the email already belongs to another login method.
    EmailAlreadyUsed { email: String },
}

impl SignInUpResult {
    pub fn user(&self) -> Option<&User> {
        match self {
            SignInUpResult::Created { user } | SignInUpResult::SignedIn { user } => Some(user),
            SignInUpResult::EmailAlreadyUsed { .. } => None,
        }
    }
}

impl Operation for SignInUp {
    const ID: &'static str = "thirdparty.sign_in_up";
    type Input = SignInUpInput;
    type Output = AuthResult<SignInUpResult>;
}

#[derive(Clone)]
pub struct Functions {
    pub sign_in_up: Implementation<SignInUp>,
}

impl Functions {
    pub(crate) fn resolve(registry: &OverrideRegistry, base: Arc<DefaultFunctions>) -> Self {
        Self {
            sign_in_up: registry.resolve::<SignInUp>(base),
        }
    }
}

pub(crate) struct DefaultFunctions {
    pub(crate) accounts: Arc<dyn AccountStore>,
}

impl DefaultFunctions {
    async fn existing(&self, input: &SignInUpInput) -> AuthResult<Option<User>> {
        let users = self
            .accounts
            .list_by_account_info(&input.tenant_id, &AccountInfo::third_party(input.third_party.clone()))
            .await?;
        Ok(users.into_iter().next())
    }

    async fn sign_in(&self, user: User, input: &SignInUpInput) -> AuthResult<SignInUpResult> {
        let email = normalize_email(&input.email);
        let current = user
            .login_methods
            .iter()
            .find(|m| m.third_party() == Some(&input.third_party))
            .map(|m| m.email().to_string());
        if current.as_deref() == Some(email.as_str()) {
            return Ok(SignInUpResult::SignedIn { user });
        }

        match self
            .accounts
            .update_third_party_email(user.id, &input.third_party, &email)
            .await?
        {
            UpdateUserOutcome::Updated(user) => {
                tracing::debug!(user_id = %user.id, "provider reported a changed email");
                Ok(SignInUpResult::SignedIn { user })
            }
            UpdateUserOutcome::UnknownUser | UpdateUserOutcome::EmailTaken => {
                Err(AuthError::store(format!("could not update email of user {}", user.id)))
            }
        }
    }
}

#[async_trait::async_trait]
impl Handler<SignInUp> for DefaultFunctions {
    async fn call(&self, input: SignInUpInput, _ctx: &RequestContext) -> AuthResult<SignInUpResult> {
        if let Some(user) = self.existing(&input).await? {
            return self.sign_in(user, &input).await;
        }

        match self
            .accounts
            .create_third_party_user(&input.tenant_id, &input.third_party, &input.email)
            .await?
        {
            CreateUserOutcome::Created(user) => {
                tracing::info!(
                    user_id = %user.id,
                    third_party_id = %input.third_party.third_party_id,
                    "third-party user created"
                );
                Ok(SignInUpResult::Created { user })
            }
            // Lost a race with a concurrent sign-up of the same identity.
            CreateUserOutcome::Duplicate => match self.existing(&input).await? {
                Some(user) => self.sign_in(user, &input).await,
                None => Err(AuthError::store("third-party user vanished after duplicate insert")),
            },
        }
    }
}
