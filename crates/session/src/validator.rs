use std::borrow::Cow;
use std::sync::Arc;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::claim::ClaimId;

/// Stable validator identifier, e.g. `"role-includes-admin"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidatorId(Cow<'static, str>);

impl ValidatorId {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for ValidatorId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why a validator rejected a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureReason {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<JsonValue>,
}

impl FailureReason {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            expected: None,
            actual: None,
        }
    }

    pub fn missing_value() -> Self {
        Self::new("value does not exist")
    }

    pub fn wrong_value(expected: JsonValue, actual: JsonValue) -> Self {
        Self {
            message: "wrong value".to_string(),
            expected: Some(expected),
            actual: Some(actual),
        }
    }
}

/// Outcome of one validator check.
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimCheck {
    Satisfied,
    Failed(FailureReason),
}

impl ClaimCheck {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, ClaimCheck::Satisfied)
    }
}

type CheckFn = dyn Fn(Option<&JsonValue>) -> ClaimCheck + Send + Sync;

/// A stateless predicate over one claim's current value.
#[derive(Clone)]
pub struct Validator {
    id: ValidatorId,
    claim_id: ClaimId,
    max_age: Option<Duration>,
    check: Arc<CheckFn>,
}

impl Validator {
    pub fn new<F>(id: impl Into<Cow<'static, str>>, claim_id: ClaimId, check: F) -> Self
    where
        F: Fn(Option<&JsonValue>) -> ClaimCheck + Send + Sync + 'static,
    {
        Self {
            id: ValidatorId::new(id),
            claim_id,
            max_age: None,
            check: Arc::new(check),
        }
    }

    /// Require the claim value to be at most `max_age` old when this validator runs.
    ///
    /// Tightens (never loosens) the claim's own refresh policy for the call.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    pub fn id(&self) -> &ValidatorId {
        &self.id
    }

    pub fn claim_id(&self) -> &ClaimId {
        &self.claim_id
    }

    pub fn max_age(&self) -> Option<Duration> {
        self.max_age
    }

    /// `value` is `None` when the session has no value for the claim.
    pub fn check(&self, value: Option<&JsonValue>) -> ClaimCheck {
        (self.check)(value)
    }
}

impl core::fmt::Debug for Validator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Validator")
            .field("id", &self.id)
            .field("claim_id", &self.claim_id)
            .field("max_age", &self.max_age)
            .finish()
    }
}

/// One failed validator. Produced per validation call, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationFailure {
    pub validator_id: ValidatorId,
    pub claim_id: ClaimId,
    pub reason: FailureReason,
}
