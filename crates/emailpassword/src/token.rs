//! Password reset token storage.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

use authkit_core::{AuthError, AuthResult, TenantId, UserId, random_token};

#[derive(Debug, Clone, PartialEq, Eq)]
struct ResetToken {
    tenant_id: TenantId,
    user_id: UserId,
    email: String,
    expires_at: DateTime<Utc>,
}

/// What a consumed token was issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumedToken {
    pub user_id: UserId,
    pub email: String,
}

/// Single-use reset tokens, kept in memory.
#[derive(Debug, Default)]
pub struct ResetTokenStore {
    tokens: Mutex<HashMap<String, ResetToken>>,
}

impl ResetTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> AuthError {
        AuthError::store("reset token store lock poisoned")
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
        let mut tokens = self.tokens.lock().map_err(|_| Self::poisoned())?;
        tokens.retain(|_, t| t.expires_at > now);
        tokens.insert(
            token.clone(),
            ResetToken {
                tenant_id: tenant_id.clone(),
                user_id,
                email: email.to_string(),
                expires_at: now + ttl,
            },
        );
        Ok(token)
    }

    /// Consuming a valid token also invalidates every other outstanding token of the user.
    /// An expired token is dropped on its own.
    pub fn consume(
        &self,
        tenant_id: &TenantId,
        token: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<ConsumedToken>> {
        let mut tokens = self.tokens.lock().map_err(|_| Self::poisoned())?;
        let Some(found) = tokens.remove(token) else {
            return Ok(None);
        };
        if found.tenant_id != *tenant_id {
            tokens.insert(token.to_string(), found);
            return Ok(None);
        }

        if found.expires_at <= now {
            return Ok(None);
        }
        tokens.retain(|_, t| t.user_id != found.user_id);
        Ok(Some(ConsumedToken {
            user_id: found.user_id,
            email: found.email,
        }))
    }
}
