use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use authkit_core::{AuthError, AuthResult, SessionId, UserId};

use crate::session::Session;
use crate::value::ClaimStore;

/// Persistence for sessions.
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert(&self, session: Session) -> AuthResult<()>;

    /// Returns the session if it exists and is within its lifetime at `now`.
    async fn get(&self, id: SessionId, now: DateTime<Utc>) -> AuthResult<Option<Session>>;

    /// Replace the claim payload. Returns `false` if the session is gone.
    async fn update_claims(&self, id: SessionId, claims: &ClaimStore) -> AuthResult<bool>;

    async fn revoke(&self, id: SessionId) -> AuthResult<bool>;

    /// Revoke every session of a user; returns how many were removed.
    async fn revoke_all_for_user(&self, user_id: UserId) -> AuthResult<usize>;
}

/// In-memory session store for tests/dev. Expired sessions are purged on access.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    inner: RwLock<HashMap<SessionId, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> AuthError {
        AuthError::store("session store lock poisoned")
    }
}

#[async_trait::async_trait]
impl SessionStore for InMemorySessionStore {
    async fn insert(&self, session: Session) -> AuthResult<()> {
        let mut map = self.inner.write().map_err(|_| Self::poisoned())?;
        map.insert(session.id, session);
        Ok(())
    }

    async fn get(&self, id: SessionId, now: DateTime<Utc>) -> AuthResult<Option<Session>> {
        let mut map = self.inner.write().map_err(|_| Self::poisoned())?;
        let Some(session) = map.get(&id) else {
            return Ok(None);
        };

        if let Err(e) = session.validate_lifetime(now) {
            tracing::debug!(session_id = %id, error = %e, "dropping session outside its lifetime");
            map.remove(&id);
            return Ok(None);
        }
        Ok(Some(session.clone()))
    }

    async fn update_claims(&self, id: SessionId, claims: &ClaimStore) -> AuthResult<bool> {
        let mut map = self.inner.write().map_err(|_| Self::poisoned())?;
        match map.get_mut(&id) {
            Some(session) => {
                session.claims = claims.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn revoke(&self, id: SessionId) -> AuthResult<bool> {
        let mut map = self.inner.write().map_err(|_| Self::poisoned())?;
        Ok(map.remove(&id).is_some())
    }

    async fn revoke_all_for_user(&self, user_id: UserId) -> AuthResult<usize> {
        let mut map = self.inner.write().map_err(|_| Self::poisoned())?;
        let before = map.len();
        map.retain(|_, s| s.user_id != user_id);
        Ok(before - map.len())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use authkit_core::TenantId;

    use super::*;

    #[tokio::test]
    async fn expired_sessions_are_invisible_and_purged() {
        let store = InMemorySessionStore::new();
        let now = Utc::now();
        let session = Session::new(UserId::new(), TenantId::default(), now, now + Duration::minutes(5));
        let id = session.id;
        store.insert(session).await.unwrap();

        assert!(store.get(id, now).await.unwrap().is_some());
        assert!(store.get(id, now + Duration::minutes(6)).await.unwrap().is_none());
        // Purged: even a "current" read no longer finds it.
        assert!(store.get(id, now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn revoke_all_for_user_only_touches_that_user() {
        let store = InMemorySessionStore::new();
        let now = Utc::now();
        let alice = UserId::new();
        let bob = UserId::new();
        for user in [alice, alice, bob] {
            store
                .insert(Session::new(user, TenantId::default(), now, now + Duration::minutes(5)))
                .await
                .unwrap();
        }

        assert_eq!(store.revoke_all_for_user(alice).await.unwrap(), 2);
        assert_eq!(store.revoke_all_for_user(alice).await.unwrap(), 0);
        assert_eq!(store.revoke_all_for_user(bob).await.unwrap(), 1);
    }
}
