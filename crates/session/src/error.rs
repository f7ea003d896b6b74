use thiserror::Error;

use authkit_core::AuthError;

use crate::claim::ClaimId;
use crate::validator::{ValidationFailure, ValidatorId};

/// Wiring mistakes. Raised while registries are being populated, never while a
/// request is being validated.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("claim '{0}' is registered twice")]
    DuplicateClaim(ClaimId),

    #[error("validator '{validator_id}' references unknown claim '{claim_id}'")]
    UnknownClaim {
        validator_id: ValidatorId,
        claim_id: ClaimId,
    },

    #[error("claim '{0}' is not registered")]
    UnregisteredClaim(ClaimId),
}

/// A claim's fetcher failed; the validation call that triggered it fails too.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("failed to refresh claim '{claim_id}': {source}")]
pub struct ClaimRefreshError {
    pub claim_id: ClaimId,
    #[source]
    pub source: AuthError,
}

impl ClaimRefreshError {
    /// Folds the claim id into the underlying fault, keeping its kind.
    pub fn into_auth_error(self) -> AuthError {
        let Self { claim_id, source } = self;
        let context = |msg: String| format!("claim '{claim_id}': {msg}");
        match source {
            AuthError::InvalidInput(msg) => AuthError::InvalidInput(context(msg)),
            AuthError::Store(msg) => AuthError::Store(context(msg)),
            AuthError::Delivery(msg) => AuthError::Delivery(context(msg)),
            AuthError::Configuration(msg) => AuthError::Configuration(context(msg)),
            AuthError::UnknownUser(msg) => AuthError::UnknownUser(context(msg)),
            AuthError::Internal(msg) => AuthError::Internal(context(msg)),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionLifetimeError {
    #[error("session has expired")]
    Expired,

    #[error("session not yet valid (created_at is in the future)")]
    NotYetValid,

    #[error("invalid session time window (expires_at <= created_at)")]
    InvalidTimeWindow,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SessionError {
    /// No session, or the session expired/was revoked.
    #[error("unauthorised")]
    Unauthorised,

    /// The session exists but at least one claim validator failed.
    #[error("invalid claims ({} failing validators)", .0.len())]
    InvalidClaims(Vec<ValidationFailure>),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    ClaimRefresh(#[from] ClaimRefreshError),

    #[error(transparent)]
    Auth(#[from] AuthError),
}
