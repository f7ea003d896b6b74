use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use authkit_core::{SessionId, TenantId, UserId};

use crate::claim::ClaimId;
use crate::error::SessionLifetimeError;
use crate::value::ClaimStore;

/// An authenticated session and its claim payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub user_id: UserId,
    pub tenant_id: TenantId,
    pub claims: ClaimStore,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn new(
        user_id: UserId,
        tenant_id: TenantId,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: SessionId::new(),
            user_id,
            tenant_id,
            claims: ClaimStore::new(),
            created_at,
            expires_at,
        }
    }

    pub fn claim_value(&self, claim_id: &ClaimId) -> Option<&JsonValue> {
        self.claims.get(claim_id).map(|v| &v.value)
    }

    /// Deterministically check the session's time window.
    pub fn validate_lifetime(&self, now: DateTime<Utc>) -> Result<(), SessionLifetimeError> {
        if self.expires_at <= self.created_at {
            return Err(SessionLifetimeError::InvalidTimeWindow);
        }
        if now < self.created_at {
            return Err(SessionLifetimeError::NotYetValid);
        }
        if now >= self.expires_at {
            return Err(SessionLifetimeError::Expired);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn session_at(now: DateTime<Utc>, ttl: Duration) -> Session {
        Session::new(UserId::new(), TenantId::default(), now, now + ttl)
    }

    #[test]
    fn lifetime_window() {
        let now = Utc::now();
        let session = session_at(now, Duration::minutes(10));

        assert_eq!(session.validate_lifetime(now), Ok(()));
        assert_eq!(
            session.validate_lifetime(now - Duration::seconds(1)),
            Err(SessionLifetimeError::NotYetValid)
        );
        assert_eq!(
            session.validate_lifetime(now + Duration::minutes(10)),
            Err(SessionLifetimeError::Expired)
        );
    }

    #[test]
    fn zero_ttl_is_an_invalid_window() {
        let now = Utc::now();
        let session = session_at(now, Duration::zero());
        assert_eq!(
            session.validate_lifetime(now),
            Err(SessionLifetimeError::InvalidTimeWindow)
        );
    }
}
