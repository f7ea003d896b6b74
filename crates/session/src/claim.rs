use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use authkit_core::{AuthResult, RequestContext, TenantId, UserId};

/// Globally unique claim identifier (e.g. `"st-role"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimId(Cow<'static, str>);

impl ClaimId {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for ClaimId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for ClaimId {
    fn from(value: &'static str) -> Self {
        Self::new(value)
    }
}

/// How long a fetched value may be used before it must be fetched again.
///
/// `max_age: None` means "fetch once, keep until explicitly changed".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshPolicy {
    pub max_age: Option<Duration>,
}

impl RefreshPolicy {
    pub fn never() -> Self {
        Self { max_age: None }
    }

    pub fn max_age(max_age: Duration) -> Self {
        Self {
            max_age: Some(max_age),
        }
    }
}

/// Computes the current value of a claim for a user.
///
/// Returning `Ok(None)` means "this user has no value for the claim"; the claim is
/// then removed from the session payload.
#[async_trait::async_trait]
pub trait ClaimFetcher: Send + Sync {
    async fn fetch(
        &self,
        user_id: UserId,
        tenant_id: &TenantId,
        ctx: &RequestContext,
    ) -> AuthResult<Option<JsonValue>>;
}

struct FnFetcher<F> {
    f: F,
}

#[async_trait::async_trait]
impl<F, Fut> ClaimFetcher for FnFetcher<F>
where
    F: Fn(UserId, TenantId, RequestContext) -> Fut + Send + Sync,
    Fut: Future<Output = AuthResult<Option<JsonValue>>> + Send,
{
    async fn fetch(
        &self,
        user_id: UserId,
        tenant_id: &TenantId,
        ctx: &RequestContext,
    ) -> AuthResult<Option<JsonValue>> {
        (self.f)(user_id, tenant_id.clone(), ctx.clone()).await
    }
}

/// Build a [`ClaimFetcher`] from an async closure.
pub fn fetcher_fn<F, Fut>(f: F) -> Arc<dyn ClaimFetcher>
where
    F: Fn(UserId, TenantId, RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AuthResult<Option<JsonValue>>> + Send + 'static,
{
    Arc::new(FnFetcher { f })
}

/// Immutable claim definition. Identity is the id.
#[derive(Clone)]
pub struct Claim {
    id: ClaimId,
    fetcher: Arc<dyn ClaimFetcher>,
    refresh_policy: RefreshPolicy,
}

impl Claim {
    pub fn new(id: impl Into<ClaimId>, fetcher: Arc<dyn ClaimFetcher>) -> Self {
        Self {
            id: id.into(),
            fetcher,
            refresh_policy: RefreshPolicy::default(),
        }
    }

    pub fn with_refresh_policy(mut self, refresh_policy: RefreshPolicy) -> Self {
        self.refresh_policy = refresh_policy;
        self
    }

    pub fn id(&self) -> &ClaimId {
        &self.id
    }

    pub fn refresh_policy(&self) -> RefreshPolicy {
        self.refresh_policy
    }

    pub async fn compute(
        &self,
        user_id: UserId,
        tenant_id: &TenantId,
        ctx: &RequestContext,
    ) -> AuthResult<Option<JsonValue>> {
        self.fetcher.fetch(user_id, tenant_id, ctx).await
    }
}

impl core::fmt::Debug for Claim {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Claim")
            .field("id", &self.id)
            .field("refresh_policy", &self.refresh_policy)
            .finish()
    }
}
