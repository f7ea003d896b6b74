//! Claims validation engine.
//!
//! The engine owns the claim registry and the global validators. Both are fixed when
//! [`ClaimsEngineBuilder::build`] runs. Request-specific validator lists are checked
//! against the registry when a [`ValidatorSet`] is assembled, so evaluation itself can
//! only fail because a fetcher failed.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use authkit_core::RequestContext;

use crate::claim::{Claim, ClaimId};
use crate::error::{ClaimRefreshError, ConfigurationError, SessionError};
use crate::session::Session;
use crate::validator::{ClaimCheck, ValidationFailure, Validator};

fn tighter(a: Option<Duration>, b: Option<Duration>) -> Option<Duration> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (Some(a), None) => Some(a),
        (None, b) => b,
    }
}

#[derive(Default)]
pub struct ClaimsEngineBuilder {
    claims: HashMap<ClaimId, Claim>,
    added_on_create: Vec<ClaimId>,
    global_validators: Vec<Validator>,
}

impl ClaimsEngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_claim(&mut self, claim: Claim) -> Result<(), ConfigurationError> {
        if self.claims.contains_key(claim.id()) {
            return Err(ConfigurationError::DuplicateClaim(claim.id().clone()));
        }
        self.claims.insert(claim.id().clone(), claim);
        Ok(())
    }

    /// Register a claim that is fetched eagerly whenever a session is created.
    pub fn register_claim_added_on_create(&mut self, claim: Claim) -> Result<(), ConfigurationError> {
        let id = claim.id().clone();
        self.register_claim(claim)?;
        self.added_on_create.push(id);
        Ok(())
    }

    /// Append a validator applied to every session verification.
    ///
    /// The claim it references must already be registered.
    pub fn add_global_validator(&mut self, validator: Validator) -> Result<(), ConfigurationError> {
        if !self.claims.contains_key(validator.claim_id()) {
            return Err(ConfigurationError::UnknownClaim {
                validator_id: validator.id().clone(),
                claim_id: validator.claim_id().clone(),
            });
        }
        self.global_validators.push(validator);
        Ok(())
    }

    pub fn build(self) -> ClaimsEngine {
        tracing::debug!(
            claims = self.claims.len(),
            global_validators = self.global_validators.len(),
            "claims engine built"
        );
        ClaimsEngine {
            inner: Arc::new(EngineInner {
                claims: self.claims,
                added_on_create: self.added_on_create,
                global_validators: self.global_validators,
            }),
        }
    }
}

struct EngineInner {
    claims: HashMap<ClaimId, Claim>,
    added_on_create: Vec<ClaimId>,
    global_validators: Vec<Validator>,
}

/// Immutable, cheaply clonable claim registry plus evaluator.
#[derive(Clone)]
pub struct ClaimsEngine {
    inner: Arc<EngineInner>,
}

#[derive(Debug, Clone)]
struct RefreshPlan {
    claim: Claim,
    max_age: Option<Duration>,
}

/// Validators checked against the registry, with each referenced claim resolved once.
#[derive(Debug, Clone)]
pub struct ValidatorSet {
    validators: Vec<Validator>,
    plans: Vec<RefreshPlan>,
}

impl ValidatorSet {
    pub fn validators(&self) -> &[Validator] {
        &self.validators
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Distinct claim ids in first-reference order.
    pub fn claim_ids(&self) -> impl Iterator<Item = &ClaimId> {
        self.plans.iter().map(|p| p.claim.id())
    }
}

impl ClaimsEngine {
    pub fn builder() -> ClaimsEngineBuilder {
        ClaimsEngineBuilder::new()
    }

    pub fn claim(&self, claim_id: &ClaimId) -> Option<&Claim> {
        self.inner.claims.get(claim_id)
    }

    pub fn global_validators(&self) -> &[Validator] {
        &self.inner.global_validators
    }

    pub fn claims_added_on_create(&self) -> impl Iterator<Item = &Claim> {
        self.inner
            .added_on_create
            .iter()
            .filter_map(|id| self.inner.claims.get(id))
    }

    /// Assemble the validators for one call.
    ///
    /// `transform` receives a copy of the global list; appending is the usual choice.
    pub fn validator_set<F>(&self, transform: F) -> Result<ValidatorSet, ConfigurationError>
    where
        F: FnOnce(Vec<Validator>) -> Vec<Validator>,
    {
        self.validator_set_from(transform(self.inner.global_validators.clone()))
    }

    pub fn global_validator_set(&self) -> Result<ValidatorSet, ConfigurationError> {
        self.validator_set_from(self.inner.global_validators.clone())
    }

    pub fn validator_set_from(
        &self,
        validators: Vec<Validator>,
    ) -> Result<ValidatorSet, ConfigurationError> {
        let mut plans: Vec<RefreshPlan> = Vec::new();

        for validator in &validators {
            let Some(claim) = self.inner.claims.get(validator.claim_id()) else {
                return Err(ConfigurationError::UnknownClaim {
                    validator_id: validator.id().clone(),
                    claim_id: validator.claim_id().clone(),
                });
            };

            match plans.iter_mut().find(|p| p.claim.id() == claim.id()) {
                Some(plan) => plan.max_age = tighter(plan.max_age, validator.max_age()),
                None => plans.push(RefreshPlan {
                    claim: claim.clone(),
                    max_age: tighter(claim.refresh_policy().max_age, validator.max_age()),
                }),
            }
        }

        Ok(ValidatorSet { validators, plans })
    }

    pub async fn validate(
        &self,
        session: &mut Session,
        set: &ValidatorSet,
        ctx: &RequestContext,
    ) -> Result<Vec<ValidationFailure>, ClaimRefreshError> {
        self.validate_at(session, set, ctx, Utc::now()).await
    }

    /// Refresh what `set` needs, then evaluate every validator in order.
    ///
    /// An empty result means every validator is satisfied.
    #[tracing::instrument(
        skip_all,
        fields(session_id = %session.id, validators = set.len())
    )]
    pub async fn validate_at(
        &self,
        session: &mut Session,
        set: &ValidatorSet,
        ctx: &RequestContext,
        now: DateTime<Utc>,
    ) -> Result<Vec<ValidationFailure>, ClaimRefreshError> {
        for plan in &set.plans {
            let stale = match session.claims.get(plan.claim.id()) {
                None => true,
                Some(value) => value.is_stale(plan.max_age, now),
            };
            if stale {
                refresh(&plan.claim, session, ctx, now).await?;
            }
        }

        let failures: Vec<ValidationFailure> = set
            .validators
            .iter()
            .filter_map(|validator| {
                match validator.check(session.claim_value(validator.claim_id())) {
                    ClaimCheck::Satisfied => None,
                    ClaimCheck::Failed(reason) => Some(ValidationFailure {
                        validator_id: validator.id().clone(),
                        claim_id: validator.claim_id().clone(),
                        reason,
                    }),
                }
            })
            .collect();

        if !failures.is_empty() {
            tracing::debug!(failures = failures.len(), "claim validation failed");
        }
        Ok(failures)
    }

    /// Unconditionally fetch one registered claim into the session.
    pub async fn refresh_claim(
        &self,
        session: &mut Session,
        claim_id: &ClaimId,
        ctx: &RequestContext,
        now: DateTime<Utc>,
    ) -> Result<(), SessionError> {
        let Some(claim) = self.claim(claim_id) else {
            return Err(ConfigurationError::UnregisteredClaim(claim_id.clone()).into());
        };
        refresh(claim, session, ctx, now).await?;
        Ok(())
    }
}

impl core::fmt::Debug for ClaimsEngine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut claims: Vec<&str> = self.inner.claims.keys().map(ClaimId::as_str).collect();
        claims.sort_unstable();
        f.debug_struct("ClaimsEngine")
            .field("claims", &claims)
            .field("global_validators", &self.inner.global_validators)
            .finish()
    }
}

pub(crate) async fn refresh(
    claim: &Claim,
    session: &mut Session,
    ctx: &RequestContext,
    now: DateTime<Utc>,
) -> Result<(), ClaimRefreshError> {
    let fetched = claim
        .compute(session.user_id, &session.tenant_id, ctx)
        .await
        .map_err(|source| {
            tracing::warn!(claim_id = %claim.id(), error = %source, "claim refresh failed");
            ClaimRefreshError {
                claim_id: claim.id().clone(),
                source,
            }
        })?;

    tracing::debug!(claim_id = %claim.id(), has_value = fetched.is_some(), "claim refreshed");
    match fetched {
        Some(value) => session.claims.set(claim.id().clone(), value, now),
        None => {
            session.claims.remove(claim.id());
        }
    }
    Ok(())
}
