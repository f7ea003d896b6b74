//! Account model and the identity/account store collaborator.
//!
//! A [`User`] is one person; each way they can sign in is a [`LoginMethod`]. Recipes
//! create and query users exclusively through [`AccountStore`].

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AuthError, AuthResult, TenantId, UserId};

/// Identity at an external provider (e.g. `google` + the provider's subject id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThirdPartyInfo {
    pub third_party_id: String,
    pub third_party_user_id: String,
}

/// One way a user can authenticate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "recipe_id", rename_all = "snake_case")]
pub enum LoginMethod {
    EmailPassword {
        tenant_id: TenantId,
        email: String,
        #[serde(skip_serializing, default)]
        password_hash: String,
        time_joined: DateTime<Utc>,
    },
    ThirdParty {
        tenant_id: TenantId,
        email: String,
        third_party: ThirdPartyInfo,
        time_joined: DateTime<Utc>,
    },
}

impl LoginMethod {
    pub fn tenant_id(&self) -> &TenantId {
        match self {
            LoginMethod::EmailPassword { tenant_id, .. } => tenant_id,
            LoginMethod::ThirdParty { tenant_id, .. } => tenant_id,
        }
    }

    pub fn email(&self) -> &str {
        match self {
            LoginMethod::EmailPassword { email, .. } => email,
            LoginMethod::ThirdParty { email, .. } => email,
        }
    }

    pub fn third_party(&self) -> Option<&ThirdPartyInfo> {
        match self {
            LoginMethod::ThirdParty { third_party, .. } => Some(third_party),
            LoginMethod::EmailPassword { .. } => None,
        }
    }

    pub fn is_email_password(&self) -> bool {
        matches!(self, LoginMethod::EmailPassword { .. })
    }

    fn matches(&self, info: &AccountInfo) -> bool {
        if let Some(email) = &info.email {
            if self.email() != normalize_email(email) {
                return false;
            }
        }
        if let Some(tp) = &info.third_party {
            if self.third_party() != Some(tp) {
                return false;
            }
        }
        // No login method carries a phone number.
        info.phone_number.is_none()
    }
}

/// A person known to the SDK.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub tenant_ids: Vec<TenantId>,
    pub time_joined: DateTime<Utc>,
    pub login_methods: Vec<LoginMethod>,
}

impl User {
    /// All distinct emails across the user's login methods.
    pub fn emails(&self) -> Vec<&str> {
        let mut emails: Vec<&str> = Vec::new();
        for method in &self.login_methods {
            if !emails.contains(&method.email()) {
                emails.push(method.email());
            }
        }
        emails
    }

    pub fn email_password_login(&self) -> Option<&LoginMethod> {
        self.login_methods.iter().find(|m| m.is_email_password())
    }

    pub fn has_third_party(&self, info: &ThirdPartyInfo) -> bool {
        self.login_methods.iter().any(|m| m.third_party() == Some(info))
    }
}

/// Lookup key for [`AccountStore::list_by_account_info`].
///
/// Every field that is set must be matched by the same login method.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub third_party: Option<ThirdPartyInfo>,
}

impl AccountInfo {
    pub fn email(email: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            ..Default::default()
        }
    }

    pub fn third_party(info: ThirdPartyInfo) -> Self {
        Self {
            third_party: Some(info),
            ..Default::default()
        }
    }
}

/// Result of a store-side create. `Duplicate` is the store's uniqueness constraint
/// firing; override layers that pre-check are only a friendlier path to the same
/// outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateUserOutcome {
    Created(User),
    Duplicate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateUserOutcome {
    Updated(User),
    UnknownUser,
    EmailTaken,
}

#[async_trait::async_trait]
pub trait AccountStore: Send + Sync {
    async fn list_by_account_info(
        &self,
        tenant_id: &TenantId,
        info: &AccountInfo,
    ) -> AuthResult<Vec<User>>;

    async fn get_user(&self, user_id: UserId) -> AuthResult<Option<User>>;

    async fn create_email_password_user(
        &self,
        tenant_id: &TenantId,
        email: &str,
        password_hash: &str,
    ) -> AuthResult<CreateUserOutcome>;

    async fn create_third_party_user(
        &self,
        tenant_id: &TenantId,
        third_party: &ThirdPartyInfo,
        email: &str,
    ) -> AuthResult<CreateUserOutcome>;

    /// Change the email and/or password hash of the user's email-password login.
    async fn update_email_password(
        &self,
        user_id: UserId,
        email: Option<&str>,
        password_hash: Option<&str>,
    ) -> AuthResult<UpdateUserOutcome>;

    /// Providers may report a changed email on a later sign-in.
    async fn update_third_party_email(
        &self,
        user_id: UserId,
        third_party: &ThirdPartyInfo,
        email: &str,
    ) -> AuthResult<UpdateUserOutcome>;
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// In-memory account store for tests/dev.
///
/// Uniqueness (one email-password login per tenant+email, one third-party login per
/// tenant+provider identity) is checked and written under the same write lock.
#[derive(Debug, Default)]
pub struct InMemoryAccountStore {
    users: RwLock<HashMap<UserId, User>>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> AuthError {
        AuthError::store("account store lock poisoned")
    }
}

#[async_trait::async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn list_by_account_info(
        &self,
        tenant_id: &TenantId,
        info: &AccountInfo,
    ) -> AuthResult<Vec<User>> {
        let users = self.users.read().map_err(|_| Self::poisoned())?;
        let mut found: Vec<User> = users
            .values()
            .filter(|u| {
                u.login_methods
                    .iter()
                    .any(|m| m.tenant_id() == tenant_id && m.matches(info))
            })
            .cloned()
            .collect();
        found.sort_by_key(|u| u.time_joined);
        Ok(found)
    }

    async fn get_user(&self, user_id: UserId) -> AuthResult<Option<User>> {
        let users = self.users.read().map_err(|_| Self::poisoned())?;
        Ok(users.get(&user_id).cloned())
    }

    async fn create_email_password_user(
        &self,
        tenant_id: &TenantId,
        email: &str,
        password_hash: &str,
    ) -> AuthResult<CreateUserOutcome> {
        let email = normalize_email(email);
        let mut users = self.users.write().map_err(|_| Self::poisoned())?;

        let taken = users.values().flat_map(|u| &u.login_methods).any(|m| {
            m.is_email_password() && m.tenant_id() == tenant_id && m.email() == email
        });
        if taken {
            return Ok(CreateUserOutcome::Duplicate);
        }

        let now = Utc::now();
        let user = User {
            id: UserId::new(),
            tenant_ids: vec![tenant_id.clone()],
            time_joined: now,
            login_methods: vec![LoginMethod::EmailPassword {
                tenant_id: tenant_id.clone(),
                email,
                password_hash: password_hash.to_string(),
                time_joined: now,
            }],
        };
        users.insert(user.id, user.clone());
        Ok(CreateUserOutcome::Created(user))
    }

    async fn create_third_party_user(
        &self,
        tenant_id: &TenantId,
        third_party: &ThirdPartyInfo,
        email: &str,
    ) -> AuthResult<CreateUserOutcome> {
        let mut users = self.users.write().map_err(|_| Self::poisoned())?;

        let taken = users
            .values()
            .flat_map(|u| &u.login_methods)
            .any(|m| m.tenant_id() == tenant_id && m.third_party() == Some(third_party));
        if taken {
            return Ok(CreateUserOutcome::Duplicate);
        }

        let now = Utc::now();
        let user = User {
            id: UserId::new(),
            tenant_ids: vec![tenant_id.clone()],
            time_joined: now,
            login_methods: vec![LoginMethod::ThirdParty {
                tenant_id: tenant_id.clone(),
                email: normalize_email(email),
                third_party: third_party.clone(),
                time_joined: now,
            }],
        };
        users.insert(user.id, user.clone());
        Ok(CreateUserOutcome::Created(user))
    }

    async fn update_email_password(
        &self,
        user_id: UserId,
        email: Option<&str>,
        password_hash: Option<&str>,
    ) -> AuthResult<UpdateUserOutcome> {
        let mut users = self.users.write().map_err(|_| Self::poisoned())?;

        let Some(tenant_id) = users
            .get(&user_id)
            .and_then(|u| u.email_password_login())
            .map(|m| m.tenant_id().clone())
        else {
            return Ok(UpdateUserOutcome::UnknownUser);
        };

        let new_email = email.map(normalize_email);
        if let Some(new_email) = &new_email {
            let taken = users
                .iter()
                .filter(|(id, _)| **id != user_id)
                .flat_map(|(_, u)| &u.login_methods)
                .any(|m| m.is_email_password() && *m.tenant_id() == tenant_id && m.email() == new_email);
            if taken {
                return Ok(UpdateUserOutcome::EmailTaken);
            }
        }

        let Some(user) = users.get_mut(&user_id) else {
            return Ok(UpdateUserOutcome::UnknownUser);
        };
        for method in &mut user.login_methods {
            if let LoginMethod::EmailPassword {
                email: current_email,
                password_hash: current_hash,
                ..
            } = method
            {
                if let Some(new_email) = &new_email {
                    *current_email = new_email.clone();
                }
                if let Some(hash) = password_hash {
                    *current_hash = hash.to_string();
                }
            }
        }
        Ok(UpdateUserOutcome::Updated(user.clone()))
    }

    async fn update_third_party_email(
        &self,
        user_id: UserId,
        third_party: &ThirdPartyInfo,
        email: &str,
    ) -> AuthResult<UpdateUserOutcome> {
        let mut users = self.users.write().map_err(|_| Self::poisoned())?;
        let Some(user) = users.get_mut(&user_id) else {
            return Ok(UpdateUserOutcome::UnknownUser);
        };

        let normalized = normalize_email(email);
        for method in &mut user.login_methods {
            if let LoginMethod::ThirdParty {
                email: current_email,
                third_party: tp,
                ..
            } = method
            {
                if tp == third_party {
                    *current_email = normalized.clone();
                }
            }
        }
        Ok(UpdateUserOutcome::Updated(user.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn google(sub: &str) -> ThirdPartyInfo {
        ThirdPartyInfo {
            third_party_id: "google".to_string(),
            third_party_user_id: sub.to_string(),
        }
    }

    #[tokio::test]
    async fn email_password_uniqueness_is_enforced_by_store() {
        let store = InMemoryAccountStore::new();
        let tenant = TenantId::default();

        let first = store
            .create_email_password_user(&tenant, "A@X.com", "hash")
            .await
            .unwrap();
        assert!(matches!(first, CreateUserOutcome::Created(_)));

        let second = store
            .create_email_password_user(&tenant, "a@x.com ", "hash")
            .await
            .unwrap();
        assert_eq!(second, CreateUserOutcome::Duplicate);

        // A different tenant is a different namespace.
        let other = store
            .create_email_password_user(&TenantId::new("acme"), "a@x.com", "hash")
            .await
            .unwrap();
        assert!(matches!(other, CreateUserOutcome::Created(_)));
    }

    #[tokio::test]
    async fn list_by_email_spans_login_methods() {
        let store = InMemoryAccountStore::new();
        let tenant = TenantId::default();

        store
            .create_email_password_user(&tenant, "a@x.com", "hash")
            .await
            .unwrap();
        store
            .create_third_party_user(&tenant, &google("g-1"), "a@x.com")
            .await
            .unwrap();
        store
            .create_third_party_user(&tenant, &google("g-2"), "b@x.com")
            .await
            .unwrap();

        let users = store
            .list_by_account_info(&tenant, &AccountInfo::email("a@x.com"))
            .await
            .unwrap();
        assert_eq!(users.len(), 2);

        let by_provider = store
            .list_by_account_info(&tenant, &AccountInfo::third_party(google("g-2")))
            .await
            .unwrap();
        assert_eq!(by_provider.len(), 1);
        assert_eq!(by_provider[0].emails(), vec!["b@x.com"]);
    }

    #[tokio::test]
    async fn phone_lookup_matches_nothing() {
        let store = InMemoryAccountStore::new();
        let tenant = TenantId::default();
        store
            .create_email_password_user(&tenant, "a@x.com", "hash")
            .await
            .unwrap();

        let info = AccountInfo {
            phone_number: Some("+15550100".to_string()),
            ..Default::default()
        };
        assert!(store.list_by_account_info(&tenant, &info).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_rejects_taken_email() {
        let store = InMemoryAccountStore::new();
        let tenant = TenantId::default();
        store
            .create_email_password_user(&tenant, "a@x.com", "hash")
            .await
            .unwrap();
        let CreateUserOutcome::Created(bob) = store
            .create_email_password_user(&tenant, "b@x.com", "hash")
            .await
            .unwrap()
        else {
            panic!("expected created");
        };

        let outcome = store
            .update_email_password(bob.id, Some("a@x.com"), None)
            .await
            .unwrap();
        assert_eq!(outcome, UpdateUserOutcome::EmailTaken);

        let outcome = store
            .update_email_password(bob.id, None, Some("new-hash"))
            .await
            .unwrap();
        let UpdateUserOutcome::Updated(user) = outcome else {
            panic!("expected updated");
        };
        let Some(LoginMethod::EmailPassword { password_hash, .. }) = user.email_password_login() else {
            panic!("expected email-password login");
        };
        assert_eq!(password_hash, "new-hash");
    }
}
