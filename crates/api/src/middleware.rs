use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use authkit::AuthKit;
use authkit_core::{RequestContext, SessionId, TenantId};
use authkit_session::VerifySessionOptions;

use crate::app::errors;
use crate::context::{SessionContext, TENANT_HEADER, TenantContext};

/// Session verification settings for one group of routes.
#[derive(Clone)]
pub struct SessionGuard {
    pub kit: AuthKit,
    pub options: VerifySessionOptions,
}

impl SessionGuard {
    pub fn new(kit: AuthKit, options: VerifySessionOptions) -> Self {
        Self { kit, options }
    }
}

/// Attaches the tenant and a fresh [`RequestContext`] to every request.
pub async fn tenant_middleware(mut req: axum::http::Request<axum::body::Body>, next: Next) -> Response {
    let tenant_id = match extract_tenant(req.headers()) {
        Ok(tenant_id) => tenant_id,
        Err(msg) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_tenant", msg),
    };
    let ctx = RequestContext::new();
    tracing::debug!(request_id = %ctx.request_id(), tenant_id = %tenant_id, "request");

    req.extensions_mut().insert(TenantContext::new(tenant_id));
    req.extensions_mut().insert(ctx);
    next.run(req).await
}

pub async fn session_middleware(
    State(guard): State<SessionGuard>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let Some(session_id) = session_id_from_headers(req.headers()) else {
        tracing::warn!("missing or malformed session handle");
        return errors::unauthorised();
    };
    let ctx = req
        .extensions()
        .get::<RequestContext>()
        .cloned()
        .unwrap_or_default();

    match guard
        .kit
        .session()
        .verify_session(session_id, &guard.options, &ctx)
        .await
    {
        Ok(session) => {
            req.extensions_mut().insert(SessionContext::new(session));
            next.run(req).await
        }
        Err(e) => errors::session_error_to_response(e),
    }
}

/// The session handle from `Authorization: Bearer <handle>`, if well-formed.
pub fn session_id_from_headers(headers: &HeaderMap) -> Option<SessionId> {
    let token = extract_bearer(headers).ok()?;
    Uuid::parse_str(token).ok().map(SessionId::from_uuid)
}

fn extract_tenant(headers: &HeaderMap) -> Result<TenantId, &'static str> {
    let Some(value) = headers.get(TENANT_HEADER) else {
        return Ok(TenantId::default());
    };
    let value = value.to_str().map_err(|_| "tenant id must be visible ASCII")?;
    let value = value.trim();
    if value.is_empty() {
        return Err("tenant id must not be empty");
    }
    if !value.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err("tenant id may only contain letters, digits, '-' and '_'");
    }
    Ok(TenantId::new(value.to_string()))
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, StatusCode> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let header = header.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?;

    let header = header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = header.trim();
    if token.is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(token)
}
