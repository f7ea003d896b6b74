//! Ready-made claim kinds and their validators.
//!
//! Validator ids are derived from the claim id and the predicate so failures are
//! self-describing: `includes("admin")` on claim `role` is `role-includes-admin`.

use std::sync::Arc;

use serde_json::Value as JsonValue;

use crate::claim::{Claim, ClaimFetcher, ClaimId, RefreshPolicy};
use crate::session::Session;
use crate::validator::{ClaimCheck, FailureReason, Validator};

fn display_value(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn display_values(values: &[JsonValue]) -> String {
    values.iter().map(display_value).collect::<Vec<_>>().join(",")
}

/// Claim holding a single JSON scalar.
#[derive(Debug, Clone)]
pub struct PrimitiveClaim {
    claim: Claim,
}

impl PrimitiveClaim {
    pub fn new(id: impl Into<ClaimId>, fetcher: Arc<dyn ClaimFetcher>) -> Self {
        Self {
            claim: Claim::new(id, fetcher),
        }
    }

    pub fn with_refresh_policy(mut self, policy: RefreshPolicy) -> Self {
        self.claim = self.claim.with_refresh_policy(policy);
        self
    }

    pub fn id(&self) -> &ClaimId {
        self.claim.id()
    }

    pub fn claim(&self) -> Claim {
        self.claim.clone()
    }

    pub fn get_value<'s>(&self, session: &'s Session) -> Option<&'s JsonValue> {
        session.claim_value(self.id())
    }

    pub fn has_value(&self, expected: impl Into<JsonValue>) -> Validator {
        let expected = expected.into();
        let id = format!("{}-equals-{}", self.id(), display_value(&expected));
        Validator::new(id, self.id().clone(), move |value| match value {
            None => ClaimCheck::Failed(FailureReason::missing_value()),
            Some(actual) if *actual == expected => ClaimCheck::Satisfied,
            Some(actual) => {
                ClaimCheck::Failed(FailureReason::wrong_value(expected.clone(), actual.clone()))
            }
        })
    }
}

/// Claim holding a boolean (e.g. "email is verified").
#[derive(Debug, Clone)]
pub struct BooleanClaim {
    inner: PrimitiveClaim,
}

impl BooleanClaim {
    pub fn new(id: impl Into<ClaimId>, fetcher: Arc<dyn ClaimFetcher>) -> Self {
        Self {
            inner: PrimitiveClaim::new(id, fetcher),
        }
    }

    pub fn with_refresh_policy(mut self, policy: RefreshPolicy) -> Self {
        self.inner = self.inner.with_refresh_policy(policy);
        self
    }

    pub fn id(&self) -> &ClaimId {
        self.inner.id()
    }

    pub fn claim(&self) -> Claim {
        self.inner.claim()
    }

    pub fn get_value(&self, session: &Session) -> Option<bool> {
        self.inner.get_value(session).and_then(JsonValue::as_bool)
    }

    pub fn is_true(&self) -> Validator {
        self.named(true)
    }

    pub fn is_false(&self) -> Validator {
        self.named(false)
    }

    fn named(&self, expected: bool) -> Validator {
        let id = format!("{}-is-{}", self.id(), expected);
        let check = self.inner.has_value(expected);
        Validator::new(id, self.id().clone(), move |value| check.check(value))
    }
}

/// Claim holding a JSON array (roles, permissions, ...).
#[derive(Debug, Clone)]
pub struct PrimitiveArrayClaim {
    claim: Claim,
}

impl PrimitiveArrayClaim {
    pub fn new(id: impl Into<ClaimId>, fetcher: Arc<dyn ClaimFetcher>) -> Self {
        Self {
            claim: Claim::new(id, fetcher),
        }
    }

    pub fn with_refresh_policy(mut self, policy: RefreshPolicy) -> Self {
        self.claim = self.claim.with_refresh_policy(policy);
        self
    }

    pub fn id(&self) -> &ClaimId {
        self.claim.id()
    }

    pub fn claim(&self) -> Claim {
        self.claim.clone()
    }

    pub fn get_value<'s>(&self, session: &'s Session) -> Option<&'s Vec<JsonValue>> {
        session.claim_value(self.id()).and_then(JsonValue::as_array)
    }

    pub fn includes(&self, item: impl Into<JsonValue>) -> Validator {
        let item = item.into();
        let id = format!("{}-includes-{}", self.id(), display_value(&item));
        self.array_validator(id, vec![item], true, false)
    }

    pub fn excludes(&self, item: impl Into<JsonValue>) -> Validator {
        let item = item.into();
        let id = format!("{}-excludes-{}", self.id(), display_value(&item));
        self.array_validator(id, vec![item], false, false)
    }

    pub fn includes_all<I, V>(&self, items: I) -> Validator
    where
        I: IntoIterator<Item = V>,
        V: Into<JsonValue>,
    {
        let items: Vec<JsonValue> = items.into_iter().map(Into::into).collect();
        let id = format!("{}-includes-all-{}", self.id(), display_values(&items));
        self.array_validator(id, items, true, true)
    }

    pub fn excludes_all<I, V>(&self, items: I) -> Validator
    where
        I: IntoIterator<Item = V>,
        V: Into<JsonValue>,
    {
        let items: Vec<JsonValue> = items.into_iter().map(Into::into).collect();
        let id = format!("{}-excludes-all-{}", self.id(), display_values(&items));
        self.array_validator(id, items, false, true)
    }

    fn array_validator(
        &self,
        id: String,
        items: Vec<JsonValue>,
        include: bool,
        all: bool,
    ) -> Validator {
        Validator::new(id, self.id().clone(), move |value| {
            let Some(value) = value else {
                return ClaimCheck::Failed(FailureReason::missing_value());
            };
            let Some(actual) = value.as_array() else {
                return ClaimCheck::Failed(FailureReason {
                    message: "wrong value type".to_string(),
                    expected: Some(JsonValue::String("array".to_string())),
                    actual: Some(value.clone()),
                });
            };

            let offending = items
                .iter()
                .find(|item| actual.contains(*item) != include);
            match offending {
                None => ClaimCheck::Satisfied,
                Some(item) => {
                    let key = match (include, all) {
                        (true, false) => "expectedToInclude",
                        (true, true) => "expectedToIncludeAll",
                        (false, false) => "expectedToNotInclude",
                        (false, true) => "expectedToNotIncludeAny",
                    };
                    let mut expected = serde_json::Map::new();
                    expected.insert(key.to_string(), item.clone());
                    ClaimCheck::Failed(FailureReason {
                        message: "wrong value".to_string(),
                        expected: Some(JsonValue::Object(expected)),
                        actual: Some(value.clone()),
                    })
                }
            }
        })
    }
}
