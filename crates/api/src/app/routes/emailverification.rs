use axum::{
    extract::Extension,
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use authkit::AuthKit;
use authkit_core::RequestContext;
use authkit_emailverification::{
    EmailVerificationRecipe, GenerateEmailVerifyTokenPostResult, VerifyEmailPostResult,
};

use crate::app::{dto, errors};
use crate::context::{SessionContext, TenantContext};
use crate::middleware::{self, SessionGuard};

pub fn router(guard: SessionGuard) -> Router {
    let protected = Router::new()
        .route("/auth/user/email/verify/token", post(generate_token))
        .route("/auth/user/email/verify", get(is_verified))
        .route_layer(axum::middleware::from_fn_with_state(
            guard,
            middleware::session_middleware,
        ));

    // Token consumption works without a session (link opened on another device).
    Router::new()
        .route("/auth/user/email/verify", post(verify_email))
        .merge(protected)
}

pub async fn generate_token(
    Extension(recipe): Extension<EmailVerificationRecipe>,
    Extension(session): Extension<SessionContext>,
    Extension(ctx): Extension<RequestContext>,
) -> axum::response::Response {
    match recipe
        .generate_email_verify_token_post(session.into_session(), &ctx)
        .await
    {
        Ok(GenerateEmailVerifyTokenPostResult::Ok) => errors::ok(json!({})),
        Ok(GenerateEmailVerifyTokenPostResult::EmailAlreadyVerified) => {
            errors::status_response("EMAIL_ALREADY_VERIFIED_ERROR", json!({}))
        }
        Err(e) => errors::auth_error_to_response(e),
    }
}

pub async fn verify_email(
    Extension(recipe): Extension<EmailVerificationRecipe>,
    Extension(kit): Extension<AuthKit>,
    Extension(tenant): Extension<TenantContext>,
    Extension(ctx): Extension<RequestContext>,
    headers: HeaderMap,
    Json(body): Json<dto::VerifyEmailRequest>,
) -> axum::response::Response {
    let session = match middleware::session_id_from_headers(&headers) {
        Some(id) => match kit.session().get_session(id).await {
            Ok(session) => session,
            Err(e) => return errors::auth_error_to_response(e),
        },
        None => None,
    };

    match recipe
        .verify_email_post(tenant.tenant_id().clone(), &body.token, session, &ctx)
        .await
    {
        Ok(VerifyEmailPostResult::Ok { user_id, email }) => {
            errors::ok(json!({ "user": { "id": user_id, "email": email } }))
        }
        Ok(VerifyEmailPostResult::EmailVerificationInvalidToken) => {
            errors::status_response("EMAIL_VERIFICATION_INVALID_TOKEN_ERROR", json!({}))
        }
        Err(e) => errors::auth_error_to_response(e),
    }
}

pub async fn is_verified(
    Extension(recipe): Extension<EmailVerificationRecipe>,
    Extension(session): Extension<SessionContext>,
    Extension(ctx): Extension<RequestContext>,
) -> axum::response::Response {
    match recipe.is_email_verified_get(session.into_session(), &ctx).await {
        Ok(verified) => errors::ok(json!({ "isVerified": verified })),
        Err(e) => errors::auth_error_to_response(e),
    }
}
