use std::sync::Arc;

use authkit_core::{
    AccountStore, AppInfo, EmailDeliveryService, InMemoryAccountStore, LoggingEmailService,
};
use authkit_emailpassword::{EmailPasswordConfig, EmailPasswordDeps, EmailPasswordRecipe};
use authkit_emailverification::{
    EmailVerificationConfig, EmailVerificationDeps, EmailVerificationRecipe,
};
use authkit_session::{
    Claim, ClaimsEngine, ConfigurationError, InMemorySessionStore, SessionConfig, SessionRecipe,
    SessionStore, Validator,
};
use authkit_thirdparty::{ThirdPartyConfig, ThirdPartyDeps, ThirdPartyRecipe};
use authkit_userroles::{UserRolesConfig, UserRolesRecipe};

/// Collects collaborators and recipe configs; [`AuthKitBuilder::build`] wires them.
pub struct AuthKitBuilder {
    app_info: AppInfo,
    accounts: Option<Arc<dyn AccountStore>>,
    email_service: Option<Arc<dyn EmailDeliveryService>>,
    session_store: Option<Arc<dyn SessionStore>>,
    session: SessionConfig,
    email_password: Option<EmailPasswordConfig>,
    third_party: Option<ThirdPartyConfig>,
    email_verification: Option<EmailVerificationConfig>,
    user_roles: Option<UserRolesConfig>,
    claims: Vec<Claim>,
    global_validators: Vec<Validator>,
}

impl AuthKitBuilder {
    fn new(app_info: AppInfo) -> Self {
        Self {
            app_info,
            accounts: None,
            email_service: None,
            session_store: None,
            session: SessionConfig::default(),
            email_password: None,
            third_party: None,
            email_verification: None,
            user_roles: None,
            claims: Vec::new(),
            global_validators: Vec::new(),
        }
    }

    /// Defaults to [`InMemoryAccountStore`].
    pub fn account_store(mut self, accounts: Arc<dyn AccountStore>) -> Self {
        self.accounts = Some(accounts);
        self
    }

    /// Defaults to [`LoggingEmailService`].
    pub fn email_service(mut self, service: Arc<dyn EmailDeliveryService>) -> Self {
        self.email_service = Some(service);
        self
    }

    /// Defaults to [`InMemorySessionStore`].
    pub fn session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.session_store = Some(store);
        self
    }

    pub fn session(mut self, config: SessionConfig) -> Self {
        self.session = config;
        self
    }

    pub fn email_password(mut self, config: EmailPasswordConfig) -> Self {
        self.email_password = Some(config);
        self
    }

    pub fn third_party(mut self, config: ThirdPartyConfig) -> Self {
        self.third_party = Some(config);
        self
    }

    pub fn email_verification(mut self, config: EmailVerificationConfig) -> Self {
        self.email_verification = Some(config);
        self
    }

    pub fn user_roles(mut self, config: UserRolesConfig) -> Self {
        self.user_roles = Some(config);
        self
    }

    /// Application-defined claim, fetched only when a validator needs it.
    pub fn claim(mut self, claim: Claim) -> Self {
        self.claims.push(claim);
        self
    }

    /// Appended after the validators the recipes contribute.
    pub fn global_validator(mut self, validator: Validator) -> Self {
        self.global_validators.push(validator);
        self
    }

    pub fn build(self) -> Result<AuthKit, ConfigurationError> {
        let accounts = self
            .accounts
            .unwrap_or_else(|| Arc::new(InMemoryAccountStore::new()));
        let email_service = self
            .email_service
            .unwrap_or_else(|| Arc::new(LoggingEmailService));
        let session_store = self
            .session_store
            .unwrap_or_else(|| Arc::new(InMemorySessionStore::new()));

        let ev_init = self
            .email_verification
            .map(|config| EmailVerificationRecipe::init(config, accounts.clone()));
        let user_roles = self.user_roles.map(UserRolesRecipe::new);

        let mut engine = ClaimsEngine::builder();
        if let Some(ev) = &ev_init {
            engine.register_claim_added_on_create(ev.claim().claim())?;
        }
        if let Some(roles) = &user_roles {
            let role = roles.role_claim().claim();
            if roles.adds_roles_on_create() {
                engine.register_claim_added_on_create(role)?;
            } else {
                engine.register_claim(role)?;
            }
            let permission = roles.permission_claim().claim();
            if roles.adds_permissions_on_create() {
                engine.register_claim_added_on_create(permission)?;
            } else {
                engine.register_claim(permission)?;
            }
        }
        for claim in self.claims {
            engine.register_claim(claim)?;
        }

        let recipe_validators = ev_init
            .as_ref()
            .map(|ev| ev.global_validators())
            .unwrap_or_default();
        for validator in recipe_validators.into_iter().chain(self.global_validators) {
            engine.add_global_validator(validator)?;
        }

        let session = SessionRecipe::new(self.session, engine.build(), session_store);

        let email_verification = ev_init.map(|init| {
            init.build(EmailVerificationDeps {
                app_info: self.app_info.clone(),
                email_service: email_service.clone(),
                session: session.clone(),
            })
        });
        let email_password = self.email_password.map(|config| {
            EmailPasswordRecipe::new(
                config,
                EmailPasswordDeps {
                    app_info: self.app_info.clone(),
                    accounts: accounts.clone(),
                    email_service: email_service.clone(),
                    session: session.clone(),
                },
            )
        });
        let third_party = self.third_party.map(|config| {
            ThirdPartyRecipe::new(
                config,
                ThirdPartyDeps {
                    accounts: accounts.clone(),
                    session: session.clone(),
                    email_verification: email_verification.clone(),
                },
            )
        });

        tracing::info!(
            app_name = %self.app_info.app_name,
            email_password = email_password.is_some(),
            third_party = third_party.is_some(),
            email_verification = email_verification.is_some(),
            user_roles = user_roles.is_some(),
            global_validators = session.engine().global_validators().len(),
            "authkit initialised"
        );

        Ok(AuthKit {
            inner: Arc::new(Inner {
                app_info: self.app_info,
                accounts,
                session,
                email_password,
                third_party,
                email_verification,
                user_roles,
            }),
        })
    }
}

struct Inner {
    app_info: AppInfo,
    accounts: Arc<dyn AccountStore>,
    session: SessionRecipe,
    email_password: Option<EmailPasswordRecipe>,
    third_party: Option<ThirdPartyRecipe>,
    email_verification: Option<EmailVerificationRecipe>,
    user_roles: Option<UserRolesRecipe>,
}

/// Immutable handle to the initialised recipes. Cheap to clone.
#[derive(Clone)]
pub struct AuthKit {
    inner: Arc<Inner>,
}

impl AuthKit {
    pub fn builder(app_info: AppInfo) -> AuthKitBuilder {
        AuthKitBuilder::new(app_info)
    }

    pub fn app_info(&self) -> &AppInfo {
        &self.inner.app_info
    }

    pub fn accounts(&self) -> &Arc<dyn AccountStore> {
        &self.inner.accounts
    }

    pub fn session(&self) -> &SessionRecipe {
        &self.inner.session
    }

    pub fn email_password(&self) -> Option<&EmailPasswordRecipe> {
        self.inner.email_password.as_ref()
    }

    pub fn third_party(&self) -> Option<&ThirdPartyRecipe> {
        self.inner.third_party.as_ref()
    }

    pub fn email_verification(&self) -> Option<&EmailVerificationRecipe> {
        self.inner.email_verification.as_ref()
    }

    pub fn user_roles(&self) -> Option<&UserRolesRecipe> {
        self.inner.user_roles.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use authkit_core::{RequestContext, TenantId, UserId};
    use authkit_emailverification::EmailVerificationMode;
    use authkit_session::{ClaimId, PrimitiveClaim, SessionError, VerifySessionOptions, fetcher_fn};

    use super::*;

    fn app_info() -> AppInfo {
        AppInfo::new("demo", "http://localhost:3001", "http://localhost:3000")
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn handle_is_send_and_sync() {
        assert_send_sync::<AuthKit>();
    }

    #[test]
    fn unknown_global_validator_claim_is_rejected() {
        let orphan = PrimitiveClaim::new(
            "org",
            fetcher_fn(|_user, _tenant, _ctx| async { authkit_core::AuthResult::Ok(Some(json!("acme"))) }),
        );
        let result = AuthKit::builder(app_info())
            .global_validator(orphan.has_value("acme"))
            .build();
        assert!(matches!(
            result.err(),
            Some(ConfigurationError::UnknownClaim { claim_id, .. }) if claim_id == ClaimId::new("org")
        ));
    }

    #[test]
    fn duplicate_claim_is_rejected() {
        let roles = UserRolesRecipe::new(UserRolesConfig::default());
        let result = AuthKit::builder(app_info())
            .user_roles(UserRolesConfig::default())
            .claim(roles.role_claim().claim())
            .build();
        assert!(matches!(result.err(), Some(ConfigurationError::DuplicateClaim(_))));
    }

    #[tokio::test]
    async fn required_email_verification_guards_every_session() {
        let kit = AuthKit::builder(app_info())
            .email_password(EmailPasswordConfig {
                password_hash_cost: 4,
                ..EmailPasswordConfig::default()
            })
            .email_verification(EmailVerificationConfig {
                mode: EmailVerificationMode::Required,
                ..EmailVerificationConfig::default()
            })
            .build()
            .unwrap();
        let ctx = RequestContext::new();

        let user = kit
            .accounts()
            .create_email_password_user(&TenantId::default(), "a@x.com", "unused-hash")
            .await
            .unwrap();
        let authkit_core::CreateUserOutcome::Created(user) = user else {
            panic!("user should be new");
        };
        let mut session = kit
            .session()
            .create_new_session(user.id, TenantId::default(), &ctx)
            .await
            .unwrap();

        match kit
            .session()
            .verify_session(session.id, &VerifySessionOptions::new(), &ctx)
            .await
        {
            Err(SessionError::InvalidClaims(failures)) => {
                assert_eq!(failures[0].claim_id.as_str(), "st-ev");
            }
            other => panic!("expected st-ev failure, got {other:?}"),
        }

        let ev = kit.email_verification().unwrap();
        ev.mark_email_as_verified(TenantId::default(), user.id, "a@x.com", &ctx)
            .await
            .unwrap();
        kit.session()
            .fetch_and_set_claim(&mut session, ev.claim().id(), &ctx)
            .await
            .unwrap();
        assert!(
            kit.session()
                .verify_session(session.id, &VerifySessionOptions::new(), &ctx)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn skipped_role_claim_is_fetched_on_demand() {
        let kit = AuthKit::builder(app_info())
            .user_roles(UserRolesConfig {
                skip_adding_roles_to_access_token: true,
                ..UserRolesConfig::default()
            })
            .build()
            .unwrap();
        let ctx = RequestContext::new();
        let roles = kit.user_roles().unwrap();
        let user = UserId::new();

        roles
            .create_new_role_or_add_permissions("admin".into(), vec!["users.write".into()], &ctx)
            .await
            .unwrap();
        roles
            .add_role_to_user(TenantId::default(), user, "admin".into(), &ctx)
            .await
            .unwrap();

        let session = kit
            .session()
            .create_new_session(user, TenantId::default(), &ctx)
            .await
            .unwrap();
        assert!(session.claim_value(roles.role_claim().id()).is_none());
        assert_eq!(
            session.claim_value(roles.permission_claim().id()),
            Some(&json!(["users.write"]))
        );

        let options = VerifySessionOptions::append(vec![roles.role_claim().includes("admin")]);
        let verified = kit
            .session()
            .verify_session(session.id, &options, &ctx)
            .await
            .unwrap();
        assert_eq!(
            verified.claim_value(roles.role_claim().id()),
            Some(&json!(["admin"]))
        );
    }
}
