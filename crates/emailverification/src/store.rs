//! Verification tokens and the set of verified (user, email) pairs.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

use authkit_core::{AuthError, AuthResult, TenantId, UserId, random_token};

#[derive(Debug, Clone)]
struct PendingVerification {
    tenant_id: TenantId,
    user_id: UserId,
    email: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct State {
    tokens: HashMap<String, PendingVerification>,
    verified: HashSet<(UserId, String)>,
}

#[derive(Debug, Default)]
pub struct VerificationStore {
    state: Mutex<State>,
}

impl VerificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> AuthError {
        AuthError::store("verification store lock poisoned")
    }

    pub fn is_verified(&self, user_id: UserId, email: &str) -> AuthResult<bool> {
        let state = self.state.lock().map_err(|_| Self::poisoned())?;
        Ok(state.verified.contains(&(user_id, email.to_string())))
    }

    pub fn unverify(&self, user_id: UserId, email: &str) -> AuthResult<()> {
        let mut state = self.state.lock().map_err(|_| Self::poisoned())?;
        state.verified.remove(&(user_id, email.to_string()));
        Ok(())
    }

    pub fn issue(
        &self,
        tenant_id: &TenantId,
        user_id: UserId,
        email: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> AuthResult<String> {
        let token = random_token();
        let mut state = self.state.lock().map_err(|_| Self::poisoned())?;
        state.tokens.retain(|_, p| p.expires_at > now);
        state.tokens.insert(
            token.clone(),
            PendingVerification {
                tenant_id: tenant_id.clone(),
                user_id,
                email: email.to_string(),
                expires_at: now + ttl,
            },
        );
        Ok(token)
    }

    /// Marks the email verified and drops every other token for the same pair.
    pub fn consume(
        &self,
        tenant_id: &TenantId,
        token: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<(UserId, String)>> {
        let mut state = self.state.lock().map_err(|_| Self::poisoned())?;
        let Some(pending) = state.tokens.get(token).cloned() else {
            return Ok(None);
        };
        if pending.tenant_id != *tenant_id {
            return Ok(None);
        }

        state.tokens.remove(token);
        if pending.expires_at <= now {
            return Ok(None);
        }
        state
            .tokens
            .retain(|_, p| !(p.user_id == pending.user_id && p.email == pending.email));
        state.verified.insert((pending.user_id, pending.email.clone()));
        Ok(Some((pending.user_id, pending.email)))
    }
}
