use authkit_core::TenantId;
use authkit_session::Session;

pub const TENANT_HEADER: &str = "x-tenant-id";

/// Tenant the request targets (from the `x-tenant-id` header, default `public`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: TenantId,
}

impl TenantContext {
    pub fn new(tenant_id: TenantId) -> Self {
        Self { tenant_id }
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }
}

/// A session that passed verification for this request.
///
/// Present only on routes behind the session guard.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionContext {
    session: Session,
}

impl SessionContext {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn into_session(self) -> Session {
        self.session
    }
}
