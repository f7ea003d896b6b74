use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::{Value as JsonValue, json};

use authkit_core::AuthError;
use authkit_session::{SessionError, ValidationFailure};

/// `200` with `{"status": <status>, ..fields}`.
pub fn status_response(status: &'static str, fields: JsonValue) -> axum::response::Response {
    let mut body = json!({ "status": status });
    if let (Some(body), JsonValue::Object(fields)) = (body.as_object_mut(), fields) {
        body.extend(fields);
    }
    (StatusCode::OK, axum::Json(body)).into_response()
}

pub fn ok(fields: JsonValue) -> axum::response::Response {
    status_response("OK", fields)
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn unauthorised() -> axum::response::Response {
    json_error(StatusCode::UNAUTHORIZED, "unauthorised", "try refresh token")
}

pub fn auth_error_to_response(err: AuthError) -> axum::response::Response {
    tracing::error!(error = %err, "request failed");
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", err.to_string())
}

pub fn session_error_to_response(err: SessionError) -> axum::response::Response {
    match err {
        SessionError::Unauthorised => unauthorised(),
        SessionError::InvalidClaims(failures) => invalid_claims(&failures),
        SessionError::Configuration(e) => {
            tracing::error!(error = %e, "session guard misconfigured");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "configuration_error", e.to_string())
        }
        SessionError::ClaimRefresh(e) => {
            tracing::error!(error = %e, "claim refresh failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "claim_refresh_error", e.to_string())
        }
        SessionError::Auth(e) => auth_error_to_response(e),
    }
}

fn invalid_claims(failures: &[ValidationFailure]) -> axum::response::Response {
    tracing::warn!(failing = failures.len(), "claim validation failed");
    let errors: Vec<JsonValue> = failures
        .iter()
        .map(|f| {
            json!({
                "id": f.claim_id.as_str(),
                "validatorId": f.validator_id.as_str(),
                "reason": f.reason,
            })
        })
        .collect();
    (
        StatusCode::FORBIDDEN,
        axum::Json(json!({
            "message": "invalid claim",
            "claimValidationErrors": errors,
        })),
    )
        .into_response()
}
