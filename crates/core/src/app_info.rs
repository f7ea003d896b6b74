use serde::{Deserialize, Serialize};

use crate::id::TenantId;

/// Where the app's backend and frontend live. Used to build links in emails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppInfo {
    pub app_name: String,
    pub api_domain: String,
    pub website_domain: String,
    #[serde(default = "default_website_base_path")]
    pub website_base_path: String,
}

fn default_website_base_path() -> String {
    "/auth".to_string()
}

impl AppInfo {
    pub fn new(
        app_name: impl Into<String>,
        api_domain: impl Into<String>,
        website_domain: impl Into<String>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            api_domain: api_domain.into(),
            website_domain: website_domain.into(),
            website_base_path: default_website_base_path(),
        }
    }

    pub fn with_website_base_path(mut self, path: impl Into<String>) -> Self {
        self.website_base_path = path.into();
        self
    }

    /// `{website_domain}{website_base_path}{path}` with duplicate slashes removed
    /// at the joins.
    pub fn website_url(&self, path: &str) -> String {
        let domain = self.website_domain.trim_end_matches('/');
        let base = self.website_base_path.trim_matches('/');
        let path = path.trim_start_matches('/');
        if base.is_empty() {
            format!("{domain}/{path}")
        } else {
            format!("{domain}/{base}/{path}")
        }
    }

    /// Website link carrying a one-time token, e.g. for password reset or email verification.
    ///
    /// Query values are percent-encoded.
    pub fn token_link(&self, path: &str, token: &str, tenant_id: &TenantId) -> String {
        format!(
            "{}?token={}&tenantId={}",
            self.website_url(path),
            urlencoding::encode(token),
            urlencoding::encode(tenant_id.as_str())
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn website_url_joins_cleanly() {
        let info = AppInfo::new("demo", "http://localhost:3001", "http://localhost:3000/");
        assert_eq!(
            info.website_url("/reset-password"),
            "http://localhost:3000/auth/reset-password"
        );

        let root = info.with_website_base_path("/");
        assert_eq!(root.website_url("verify-email"), "http://localhost:3000/verify-email");
    }

    #[test]
    fn token_link_encodes_query_values() {
        let info = AppInfo::new("demo", "http://localhost:3001", "http://localhost:3000");
        assert_eq!(
            info.token_link("reset-password", "abc123", &TenantId::default()),
            "http://localhost:3000/auth/reset-password?token=abc123&tenantId=public"
        );
        assert_eq!(
            info.token_link("verify-email", "a&b", &TenantId::new("acme&admin=1#x")),
            "http://localhost:3000/auth/verify-email?token=a%26b&tenantId=acme%26admin%3D1%23x"
        );
    }
}
