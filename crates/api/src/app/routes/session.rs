use axum::{
    extract::Extension,
    routing::{get, post},
    Router,
};
use serde_json::json;

use authkit::AuthKit;

use crate::app::{dto, errors};
use crate::context::SessionContext;
use crate::middleware::{self, SessionGuard};

pub fn sign_out_router(guard: SessionGuard) -> Router {
    Router::new()
        .route("/auth/signout", post(sign_out))
        .route_layer(axum::middleware::from_fn_with_state(guard, middleware::session_middleware))
}

pub fn session_info_router(guard: SessionGuard) -> Router {
    Router::new()
        .route("/sessioninfo", get(session_info))
        .route_layer(axum::middleware::from_fn_with_state(guard, middleware::session_middleware))
}

/// Routes that additionally require the `admin` role.
pub fn admin_router(guard: SessionGuard) -> Router {
    Router::new()
        .route("/admin/ping", get(admin_ping))
        .route_layer(axum::middleware::from_fn_with_state(guard, middleware::session_middleware))
}

pub async fn sign_out(
    Extension(kit): Extension<AuthKit>,
    Extension(session): Extension<SessionContext>,
) -> axum::response::Response {
    match kit.session().revoke_session(session.session().id).await {
        Ok(_) => errors::ok(json!({})),
        Err(e) => errors::auth_error_to_response(e),
    }
}

pub async fn session_info(Extension(session): Extension<SessionContext>) -> axum::response::Response {
    errors::ok(dto::session_json(session.session()))
}

pub async fn admin_ping(Extension(session): Extension<SessionContext>) -> axum::response::Response {
    errors::ok(json!({ "userId": session.session().user_id, "message": "pong" }))
}
