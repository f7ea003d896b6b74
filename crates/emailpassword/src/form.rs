//! Sign-up/sign-in form fields and their validation.

use serde::{Deserialize, Serialize};

pub const EMAIL_FIELD: &str = "email";
pub const PASSWORD_FIELD: &str = "password";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormField {
    pub id: String,
    pub value: String,
}

impl FormField {
    pub fn new(id: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub id: String,
    pub error: String,
}

impl FieldError {
    fn new(id: &str, error: &str) -> Self {
        Self {
            id: id.to_string(),
            error: error.to_string(),
        }
    }
}

/// Returns the error message, if any.
pub fn validate_email(email: &str) -> Option<&'static str> {
    let email = email.trim();
    let Some((local, domain)) = email.split_once('@') else {
        return Some("Email is invalid");
    };
    let valid = !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain
            .split('.')
            .collect::<Vec<_>>()
            .split_last()
            .is_some_and(|(tld, rest)| tld.len() >= 2 && !rest.is_empty() && rest.iter().all(|p| !p.is_empty()));
    if valid { None } else { Some("Email is invalid") }
}

/// At least 8 and at most 100 characters, with at least one letter and one digit.
pub fn validate_password(password: &str) -> Option<&'static str> {
    let len = password.chars().count();
    if len < 8 {
        return Some("Password must contain at least 8 characters, including a number");
    }
    if len >= 100 {
        return Some("Password's length must be lesser than 100 characters");
    }
    if !password.chars().any(char::is_alphabetic) {
        return Some("Password must contain at least one alphabet");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Some("Password must contain at least one number");
    }
    None
}

/// Validated sign-up/sign-in credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

fn field<'a>(fields: &'a [FormField], id: &str) -> Option<&'a str> {
    fields.iter().find(|f| f.id == id).map(|f| f.value.as_str())
}

/// Check `email` and `password`. Sign-in skips the password policy so users created
/// under an older policy can still sign in.
pub fn validate_credentials(
    fields: &[FormField],
    check_password_policy: bool,
) -> Result<Credentials, Vec<FieldError>> {
    let mut errors = Vec::new();

    let email = field(fields, EMAIL_FIELD);
    match email {
        None => errors.push(FieldError::new(EMAIL_FIELD, "Field is not optional")),
        Some(email) => {
            if let Some(error) = validate_email(email) {
                errors.push(FieldError::new(EMAIL_FIELD, error));
            }
        }
    }

    let password = field(fields, PASSWORD_FIELD);
    match password {
        None => errors.push(FieldError::new(PASSWORD_FIELD, "Field is not optional")),
        Some(password) if check_password_policy => {
            if let Some(error) = validate_password(password) {
                errors.push(FieldError::new(PASSWORD_FIELD, error));
            }
        }
        Some(_) => {}
    }

    match (email, password) {
        (Some(email), Some(password)) if errors.is_empty() => Ok(Credentials {
            email: email.trim().to_string(),
            password: password.to_string(),
        }),
        _ => Err(errors),
    }
}

/// Only the email field (password reset token request).
pub fn validate_email_field(fields: &[FormField]) -> Result<String, Vec<FieldError>> {
    match field(fields, EMAIL_FIELD) {
        None => Err(vec![FieldError::new(EMAIL_FIELD, "Field is not optional")]),
        Some(email) => match validate_email(email) {
            Some(error) => Err(vec![FieldError::new(EMAIL_FIELD, error)]),
            None => Ok(email.trim().to_string()),
        },
    }
}

/// Only the new password (password reset).
pub fn validate_password_field(fields: &[FormField]) -> Result<String, Vec<FieldError>> {
    match field(fields, PASSWORD_FIELD) {
        None => Err(vec![FieldError::new(PASSWORD_FIELD, "Field is not optional")]),
        Some(password) => match validate_password(password) {
            Some(error) => Err(vec![FieldError::new(PASSWORD_FIELD, error)]),
            None => Ok(password.to_string()),
        },
    }
}
