use serde::Deserialize;
use serde_json::{Value as JsonValue, json};

use authkit_core::User;
use authkit_emailpassword::FormField;
use authkit_session::Session;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormFieldsRequest {
    pub form_fields: Vec<FormField>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordResetRequest {
    pub token: String,
    pub form_fields: Vec<FormField>,
}

#[derive(Debug, Deserialize)]
pub struct EmailQuery {
    pub email: String,
}

/// Provider user info; the code exchange has already happened.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInUpRequest {
    pub third_party_id: String,
    pub third_party_user_id: String,
    pub email: String,
    #[serde(default)]
    pub email_verified: bool,
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailRequest {
    pub token: String,
}

// -------------------------
// Response mapping
// -------------------------

pub fn user_json(user: &User) -> JsonValue {
    json!({
        "id": user.id,
        "tenantIds": user.tenant_ids,
        "timeJoined": user.time_joined.timestamp_millis(),
        "emails": user.emails(),
        "loginMethods": user.login_methods,
    })
}

pub fn session_json(session: &Session) -> JsonValue {
    json!({
        "sessionHandle": session.id,
        "userId": session.user_id,
        "tenantId": session.tenant_id,
        "accessTokenPayload": session.claims.to_json(),
        "expiresAt": session.expires_at.timestamp_millis(),
    })
}
