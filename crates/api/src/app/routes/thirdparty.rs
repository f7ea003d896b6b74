use axum::{extract::Extension, routing::post, Json, Router};
use serde_json::json;

use authkit_core::{RequestContext, ThirdPartyInfo};
use authkit_thirdparty::{SignInUpPostInput, SignInUpPostResult, ThirdPartyRecipe};

use crate::app::routes::with_session;
use crate::app::{dto, errors};
use crate::context::TenantContext;

pub fn router() -> Router {
    Router::new().route("/auth/signinup", post(sign_in_up))
}

pub async fn sign_in_up(
    Extension(recipe): Extension<ThirdPartyRecipe>,
    Extension(tenant): Extension<TenantContext>,
    Extension(ctx): Extension<RequestContext>,
    Json(body): Json<dto::SignInUpRequest>,
) -> axum::response::Response {
    let input = SignInUpPostInput {
        tenant_id: tenant.tenant_id().clone(),
        third_party: ThirdPartyInfo {
            third_party_id: body.third_party_id,
            third_party_user_id: body.third_party_user_id,
        },
        email: body.email,
        email_verified: body.email_verified,
    };
    match recipe.sign_in_up_post(input, &ctx).await {
        Ok(SignInUpPostResult::Ok {
            user,
            created_new_user,
            session,
        }) => with_session(
            &session,
            errors::ok(json!({
                "user": dto::user_json(&user),
                "createdNewUser": created_new_user,
            })),
        ),
        Ok(SignInUpPostResult::SignInUpNotAllowed { reason }) => {
            errors::status_response("SIGN_IN_UP_NOT_ALLOWED", json!({ "reason": reason }))
        }
        Ok(SignInUpPostResult::GeneralError { message }) => {
            errors::status_response("GENERAL_ERROR", json!({ "message": message }))
        }
        Err(e) => errors::auth_error_to_response(e),
    }
}
