//! Session recipe: session lifecycle plus the `verify_session` guard.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::Value as JsonValue;

use authkit_core::{AuthResult, RequestContext, SessionId, TenantId, UserId};
use authkit_overrides::{Handler, Implementation, Operation, OverrideRegistry};

use crate::claim::ClaimId;
use crate::engine::{self, ClaimsEngine};
use crate::error::{ConfigurationError, SessionError};
use crate::session::Session;
use crate::store::SessionStore;
use crate::validator::{ValidationFailure, Validator};

/// Overridable: create and persist a session for an authenticated user.
pub struct CreateNewSession;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateNewSessionInput {
    pub user_id: UserId,
    pub tenant_id: TenantId,
}

impl Operation for CreateNewSession {
    const ID: &'static str = "session.create_new_session";
    type Input = CreateNewSessionInput;
    type Output = AuthResult<Session>;
}

pub struct SessionConfig {
    pub session_ttl: Duration,
    pub functions: OverrideRegistry,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_ttl: Duration::hours(1),
            functions: OverrideRegistry::new(),
        }
    }
}

type ValidatorTransform = dyn Fn(Vec<Validator>, &Session) -> Vec<Validator> + Send + Sync;

/// Per-call options for [`SessionRecipe::verify_session`].
///
/// Without a transform the global validators apply unchanged.
#[derive(Clone, Default)]
pub struct VerifySessionOptions {
    override_global_claim_validators: Option<Arc<ValidatorTransform>>,
}

impl VerifySessionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn override_global_claim_validators<F>(mut self, f: F) -> Self
    where
        F: Fn(Vec<Validator>, &Session) -> Vec<Validator> + Send + Sync + 'static,
    {
        self.override_global_claim_validators = Some(Arc::new(f));
        self
    }

    /// Global validators followed by `extra`.
    pub fn append(extra: Vec<Validator>) -> Self {
        Self::new().override_global_claim_validators(move |mut globals, _session| {
            globals.extend(extra.iter().cloned());
            globals
        })
    }
}

impl core::fmt::Debug for VerifySessionOptions {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("VerifySessionOptions")
            .field(
                "override_global_claim_validators",
                &self.override_global_claim_validators.is_some(),
            )
            .finish()
    }
}

struct DefaultCreateNewSession {
    engine: ClaimsEngine,
    store: Arc<dyn SessionStore>,
    session_ttl: Duration,
}

#[async_trait::async_trait]
impl Handler<CreateNewSession> for DefaultCreateNewSession {
    async fn call(&self, input: CreateNewSessionInput, ctx: &RequestContext) -> AuthResult<Session> {
        let now = Utc::now();
        let mut session = Session::new(input.user_id, input.tenant_id, now, now + self.session_ttl);

        for claim in self.engine.claims_added_on_create() {
            engine::refresh(claim, &mut session, ctx, now)
                .await
                .map_err(|e| {
                    tracing::warn!(
                        claim_id = %e.claim_id,
                        user_id = %session.user_id,
                        error = %e.source,
                        "claim fetch failed during session creation"
                    );
                    e.into_auth_error()
                })?;
        }

        self.store.insert(session.clone()).await?;
        tracing::info!(
            session_id = %session.id,
            user_id = %session.user_id,
            tenant_id = %session.tenant_id,
            claims = session.claims.len(),
            "session created"
        );
        Ok(session)
    }
}

struct SessionRecipeInner {
    engine: ClaimsEngine,
    store: Arc<dyn SessionStore>,
    create_new_session: Implementation<CreateNewSession>,
}

/// Cheaply clonable handle; everything inside is fixed at construction.
#[derive(Clone)]
pub struct SessionRecipe {
    inner: Arc<SessionRecipeInner>,
}

impl SessionRecipe {
    pub fn new(config: SessionConfig, engine: ClaimsEngine, store: Arc<dyn SessionStore>) -> Self {
        let base: Implementation<CreateNewSession> = Arc::new(DefaultCreateNewSession {
            engine: engine.clone(),
            store: store.clone(),
            session_ttl: config.session_ttl,
        });
        let create_new_session = config.functions.resolve::<CreateNewSession>(base);

        Self {
            inner: Arc::new(SessionRecipeInner {
                engine,
                store,
                create_new_session,
            }),
        }
    }

    pub fn engine(&self) -> &ClaimsEngine {
        &self.inner.engine
    }

    pub async fn create_new_session(
        &self,
        user_id: UserId,
        tenant_id: TenantId,
        ctx: &RequestContext,
    ) -> AuthResult<Session> {
        self.inner
            .create_new_session
            .call(CreateNewSessionInput { user_id, tenant_id }, ctx)
            .await
    }

    pub async fn get_session(&self, session_id: SessionId) -> AuthResult<Option<Session>> {
        self.inner.store.get(session_id, Utc::now()).await
    }

    pub async fn revoke_session(&self, session_id: SessionId) -> AuthResult<bool> {
        let revoked = self.inner.store.revoke(session_id).await?;
        if revoked {
            tracing::info!(session_id = %session_id, "session revoked");
        }
        Ok(revoked)
    }

    pub async fn revoke_all_sessions_for_user(&self, user_id: UserId) -> AuthResult<usize> {
        self.inner.store.revoke_all_for_user(user_id).await
    }

    /// Load the session and check it against the global validators (possibly
    /// transformed by `options`). Refreshed claim values are persisted even when
    /// validation fails.
    #[tracing::instrument(skip_all, fields(session_id = %session_id))]
    pub async fn verify_session(
        &self,
        session_id: SessionId,
        options: &VerifySessionOptions,
        ctx: &RequestContext,
    ) -> Result<Session, SessionError> {
        let now = Utc::now();
        let Some(mut session) = self.inner.store.get(session_id, now).await? else {
            tracing::warn!("no valid session");
            return Err(SessionError::Unauthorised);
        };

        let set = match &options.override_global_claim_validators {
            Some(transform) => self.engine().validator_set(|globals| transform(globals, &session))?,
            None => self.engine().global_validator_set()?,
        };

        let before = session.claims.clone();
        let failures = self.engine().validate_at(&mut session, &set, ctx, now).await?;
        if session.claims != before {
            self.persist_claims(&session).await?;
        }

        if failures.is_empty() {
            Ok(session)
        } else {
            tracing::warn!(failures = failures.len(), "session claims rejected");
            Err(SessionError::InvalidClaims(failures))
        }
    }

    /// Run `validators` against an already-loaded session.
    pub async fn validate_claims(
        &self,
        session: &mut Session,
        validators: Vec<Validator>,
        ctx: &RequestContext,
    ) -> Result<Vec<ValidationFailure>, SessionError> {
        let set = self.engine().validator_set_from(validators)?;
        let before = session.claims.clone();
        let failures = self.engine().validate(session, &set, ctx).await?;
        if session.claims != before {
            self.persist_claims(session).await?;
        }
        Ok(failures)
    }

    /// Like [`SessionRecipe::validate_claims`], but any failure is an error.
    pub async fn assert_claims(
        &self,
        session: &mut Session,
        validators: Vec<Validator>,
        ctx: &RequestContext,
    ) -> Result<(), SessionError> {
        let failures = self.validate_claims(session, validators, ctx).await?;
        if failures.is_empty() {
            Ok(())
        } else {
            Err(SessionError::InvalidClaims(failures))
        }
    }

    pub async fn fetch_and_set_claim(
        &self,
        session: &mut Session,
        claim_id: &ClaimId,
        ctx: &RequestContext,
    ) -> Result<(), SessionError> {
        self.engine()
            .refresh_claim(session, claim_id, ctx, Utc::now())
            .await?;
        self.persist_claims(session).await
    }

    pub async fn set_claim_value(
        &self,
        session: &mut Session,
        claim_id: &ClaimId,
        value: JsonValue,
    ) -> Result<(), SessionError> {
        self.ensure_registered(claim_id)?;
        session.claims.set(claim_id.clone(), value, Utc::now());
        self.persist_claims(session).await
    }

    pub async fn remove_claim(
        &self,
        session: &mut Session,
        claim_id: &ClaimId,
    ) -> Result<(), SessionError> {
        self.ensure_registered(claim_id)?;
        session.claims.remove(claim_id);
        self.persist_claims(session).await
    }

    fn ensure_registered(&self, claim_id: &ClaimId) -> Result<(), ConfigurationError> {
        match self.engine().claim(claim_id) {
            Some(_) => Ok(()),
            None => Err(ConfigurationError::UnregisteredClaim(claim_id.clone())),
        }
    }

    async fn persist_claims(&self, session: &Session) -> Result<(), SessionError> {
        let updated = self
            .inner
            .store
            .update_claims(session.id, &session.claims)
            .await?;
        if updated {
            Ok(())
        } else {
            Err(SessionError::Unauthorised)
        }
    }
}

impl core::fmt::Debug for SessionRecipe {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionRecipe")
            .field("engine", &self.inner.engine)
            .finish()
    }
}
