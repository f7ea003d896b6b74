//! Server configuration, read from `AUTHKIT_*` environment variables.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use authkit_emailverification::EmailVerificationMode;

pub const ENV_PREFIX: &str = "AUTHKIT_";

/// Upper bound for every TTL setting (ten years).
pub const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 3600;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key}={value:?} is invalid: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub bind_addr: String,
    pub app_name: String,
    pub api_domain: String,
    pub website_domain: String,
    pub website_base_path: String,
    pub session_ttl_secs: u64,
    pub password_reset_token_ttl_secs: u64,
    pub email_verification: EmailVerificationMode,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3001".to_string(),
            app_name: "authkit".to_string(),
            api_domain: "http://localhost:3001".to_string(),
            website_domain: "http://localhost:3000".to_string(),
            website_base_path: "/auth".to_string(),
            session_ttl_secs: 3600,
            password_reset_token_ttl_secs: 3600,
            email_verification: EmailVerificationMode::Optional,
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));
        let mut config = Self::default();

        if let Some(v) = get("BIND_ADDR") {
            if v.parse::<std::net::SocketAddr>().is_err() {
                return Err(invalid("BIND_ADDR", v, "expected host:port"));
            }
            config.bind_addr = v;
        }
        if let Some(v) = get("APP_NAME") {
            config.app_name = non_empty("APP_NAME", v)?;
        }
        if let Some(v) = get("API_DOMAIN") {
            config.api_domain = url_like("API_DOMAIN", v)?;
        }
        if let Some(v) = get("WEBSITE_DOMAIN") {
            config.website_domain = url_like("WEBSITE_DOMAIN", v)?;
        }
        if let Some(v) = get("WEBSITE_BASE_PATH") {
            if !v.starts_with('/') {
                return Err(invalid("WEBSITE_BASE_PATH", v, "must start with '/'"));
            }
            config.website_base_path = v;
        }
        if let Some(v) = get("SESSION_TTL_SECS") {
            config.session_ttl_secs = positive_secs("SESSION_TTL_SECS", v)?;
        }
        if let Some(v) = get("PASSWORD_RESET_TOKEN_TTL_SECS") {
            config.password_reset_token_ttl_secs = positive_secs("PASSWORD_RESET_TOKEN_TTL_SECS", v)?;
        }
        if let Some(v) = get("EMAIL_VERIFICATION") {
            config.email_verification = match v.to_lowercase().as_str() {
                "required" => EmailVerificationMode::Required,
                "optional" => EmailVerificationMode::Optional,
                _ => return Err(invalid("EMAIL_VERIFICATION", v, "expected 'required' or 'optional'")),
            };
        }

        Ok(config)
    }
}

fn invalid(name: &str, value: String, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key: format!("{ENV_PREFIX}{name}"),
        value,
        reason: reason.to_string(),
    }
}

fn non_empty(name: &str, value: String) -> Result<String, ConfigError> {
    if value.trim().is_empty() {
        return Err(invalid(name, value, "must not be empty"));
    }
    Ok(value)
}

fn url_like(name: &str, value: String) -> Result<String, ConfigError> {
    if !(value.starts_with("http://") || value.starts_with("https://")) {
        return Err(invalid(name, value, "expected an http(s) origin"));
    }
    Ok(value.trim_end_matches('/').to_string())
}

fn positive_secs(name: &str, value: String) -> Result<u64, ConfigError> {
    match value.parse::<u64>() {
        Ok(secs) if secs > 0 && secs <= MAX_TTL_SECS => Ok(secs),
        _ => Err(invalid(name, value, "expected a positive number of seconds, at most ten years")),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn unset_variables_keep_defaults() {
        assert_eq!(ApiConfig::from_lookup(lookup(&[])).unwrap(), ApiConfig::default());
    }

    #[test]
    fn variables_override_defaults() {
        let config = ApiConfig::from_lookup(lookup(&[
            ("AUTHKIT_BIND_ADDR", "127.0.0.1:9000"),
            ("AUTHKIT_WEBSITE_DOMAIN", "https://example.com/"),
            ("AUTHKIT_SESSION_TTL_SECS", "60"),
            ("AUTHKIT_EMAIL_VERIFICATION", "REQUIRED"),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.website_domain, "https://example.com");
        assert_eq!(config.session_ttl_secs, 60);
        assert_eq!(config.email_verification, EmailVerificationMode::Required);
    }

    #[test]
    fn invalid_values_are_errors() {
        for (key, value) in [
            ("AUTHKIT_BIND_ADDR", "nowhere"),
            ("AUTHKIT_SESSION_TTL_SECS", "0"),
            ("AUTHKIT_SESSION_TTL_SECS", "99999999999"),
            ("AUTHKIT_PASSWORD_RESET_TOKEN_TTL_SECS", "soon"),
            ("AUTHKIT_EMAIL_VERIFICATION", "sometimes"),
            ("AUTHKIT_WEBSITE_BASE_PATH", "auth"),
            ("AUTHKIT_API_DOMAIN", "localhost:3001"),
            ("AUTHKIT_APP_NAME", "  "),
        ] {
            let err = ApiConfig::from_lookup(lookup(&[(key, value)])).unwrap_err();
            let ConfigError::Invalid { key: reported, .. } = err;
            assert_eq!(reported, key);
        }
    }
}
