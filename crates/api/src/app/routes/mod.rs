use axum::{Extension, Router, http::HeaderValue, response::Response};

use authkit::AuthKit;
use authkit_emailverification::EMAIL_VERIFICATION_CLAIM_ID;
use authkit_session::{Session, VerifySessionOptions};

use crate::middleware::SessionGuard;

pub mod emailpassword;
pub mod emailverification;
pub mod session;
pub mod system;
pub mod thirdparty;

/// Response header carrying the session handle.
pub const ACCESS_TOKEN_HEADER: &str = "st-access-token";

/// Router for every enabled recipe plus the session-protected endpoints.
pub fn router(kit: &AuthKit) -> Router {
    let mut router = Router::new();

    if let Some(recipe) = kit.email_password() {
        router = router.merge(emailpassword::router().layer(Extension(recipe.clone())));
    }
    if let Some(recipe) = kit.third_party() {
        router = router.merge(thirdparty::router().layer(Extension(recipe.clone())));
    }
    if let Some(recipe) = kit.email_verification() {
        // Verification endpoints must stay reachable while the email is unverified.
        let without_ev = VerifySessionOptions::new().override_global_claim_validators(|globals, _| {
            globals
                .into_iter()
                .filter(|v| v.claim_id().as_str() != EMAIL_VERIFICATION_CLAIM_ID)
                .collect()
        });
        router = router.merge(
            emailverification::router(SessionGuard::new(kit.clone(), without_ev))
                .layer(Extension(recipe.clone())),
        );
    }

    let no_claims = VerifySessionOptions::new().override_global_claim_validators(|_, _| Vec::new());
    router = router
        .merge(session::sign_out_router(SessionGuard::new(kit.clone(), no_claims)))
        .merge(session::session_info_router(SessionGuard::new(
            kit.clone(),
            VerifySessionOptions::new(),
        )));

    if let Some(roles) = kit.user_roles() {
        let admin = VerifySessionOptions::append(vec![roles.role_claim().includes("admin")]);
        router = router.merge(session::admin_router(SessionGuard::new(kit.clone(), admin)));
    }

    router
}

/// Attach the session handle to a response.
pub fn with_session(session: &Session, mut response: Response) -> Response {
    if let Ok(value) = HeaderValue::from_str(&session.id.to_string()) {
        response.headers_mut().insert(ACCESS_TOKEN_HEADER, value);
    }
    response
}
