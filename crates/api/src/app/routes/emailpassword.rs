use axum::{
    extract::{Extension, Query},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use authkit_core::RequestContext;
use authkit_emailpassword::{
    EmailPasswordRecipe, GeneratePasswordResetTokenPostResult, PasswordResetPostResult,
    SignInPostResult, SignUpPostResult,
};

use crate::app::routes::with_session;
use crate::app::{dto, errors};
use crate::context::TenantContext;

pub fn router() -> Router {
    Router::new()
        .route("/auth/signup", post(sign_up))
        .route("/auth/signin", post(sign_in))
        .route("/auth/emailpassword/email/exists", get(email_exists))
        .route("/auth/user/password/reset/token", post(generate_password_reset_token))
        .route("/auth/user/password/reset", post(password_reset))
}

pub async fn sign_up(
    Extension(recipe): Extension<EmailPasswordRecipe>,
    Extension(tenant): Extension<TenantContext>,
    Extension(ctx): Extension<RequestContext>,
    Json(body): Json<dto::FormFieldsRequest>,
) -> axum::response::Response {
    match recipe
        .sign_up_post(tenant.tenant_id().clone(), &body.form_fields, &ctx)
        .await
    {
        Ok(SignUpPostResult::Ok { user, session }) => {
            with_session(&session, errors::ok(json!({ "user": dto::user_json(&user) })))
        }
        Ok(SignUpPostResult::EmailAlreadyExists) => {
            errors::status_response("EMAIL_ALREADY_EXISTS_ERROR", json!({}))
        }
        Ok(SignUpPostResult::FieldError { form_fields }) => {
            errors::status_response("FIELD_ERROR", json!({ "formFields": form_fields }))
        }
        Err(e) => errors::auth_error_to_response(e),
    }
}

pub async fn sign_in(
    Extension(recipe): Extension<EmailPasswordRecipe>,
    Extension(tenant): Extension<TenantContext>,
    Extension(ctx): Extension<RequestContext>,
    Json(body): Json<dto::FormFieldsRequest>,
) -> axum::response::Response {
    match recipe
        .sign_in_post(tenant.tenant_id().clone(), &body.form_fields, &ctx)
        .await
    {
        Ok(SignInPostResult::Ok { user, session }) => {
            with_session(&session, errors::ok(json!({ "user": dto::user_json(&user) })))
        }
        Ok(SignInPostResult::WrongCredentials) => {
            errors::status_response("WRONG_CREDENTIALS_ERROR", json!({}))
        }
        Ok(SignInPostResult::FieldError { form_fields }) => {
            errors::status_response("FIELD_ERROR", json!({ "formFields": form_fields }))
        }
        Err(e) => errors::auth_error_to_response(e),
    }
}

pub async fn email_exists(
    Extension(recipe): Extension<EmailPasswordRecipe>,
    Extension(tenant): Extension<TenantContext>,
    Extension(ctx): Extension<RequestContext>,
    Query(query): Query<dto::EmailQuery>,
) -> axum::response::Response {
    match recipe
        .email_exists_get(tenant.tenant_id().clone(), &query.email, &ctx)
        .await
    {
        Ok(exists) => errors::ok(json!({ "exists": exists })),
        Err(e) => errors::auth_error_to_response(e),
    }
}

pub async fn generate_password_reset_token(
    Extension(recipe): Extension<EmailPasswordRecipe>,
    Extension(tenant): Extension<TenantContext>,
    Extension(ctx): Extension<RequestContext>,
    Json(body): Json<dto::FormFieldsRequest>,
) -> axum::response::Response {
    match recipe
        .generate_password_reset_token_post(tenant.tenant_id().clone(), &body.form_fields, &ctx)
        .await
    {
        Ok(GeneratePasswordResetTokenPostResult::Ok) => errors::ok(json!({})),
        Ok(GeneratePasswordResetTokenPostResult::FieldError { form_fields }) => {
            errors::status_response("FIELD_ERROR", json!({ "formFields": form_fields }))
        }
        Err(e) => errors::auth_error_to_response(e),
    }
}

pub async fn password_reset(
    Extension(recipe): Extension<EmailPasswordRecipe>,
    Extension(tenant): Extension<TenantContext>,
    Extension(ctx): Extension<RequestContext>,
    Json(body): Json<dto::PasswordResetRequest>,
) -> axum::response::Response {
    match recipe
        .password_reset_post(tenant.tenant_id().clone(), &body.token, &body.form_fields, &ctx)
        .await
    {
        Ok(PasswordResetPostResult::Ok { user_id, email }) => {
            errors::ok(json!({ "user": { "id": user_id, "email": email } }))
        }
        Ok(PasswordResetPostResult::ResetPasswordInvalidToken) => {
            errors::status_response("RESET_PASSWORD_INVALID_TOKEN_ERROR", json!({}))
        }
        Ok(PasswordResetPostResult::FieldError { form_fields }) => {
            errors::status_response("FIELD_ERROR", json!({ "formFields": form_fields }))
        }
        Err(e) => errors::auth_error_to_response(e),
    }
}
