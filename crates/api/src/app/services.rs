//! Recipe wiring for the server binary.

use std::sync::Arc;

use chrono::Duration;

use authkit::{
    AuthKit, deny_email_password_when_email_exists, deny_third_party_when_email_exists,
    general_error_on_sign_in_up_not_allowed,
};
use authkit_core::{AccountStore, AppInfo, EmailDeliveryService, InMemoryAccountStore};
use authkit_emailpassword::{EmailPasswordConfig, SignUp};
use authkit_emailverification::EmailVerificationConfig;
use authkit_overrides::OverrideRegistry;
use authkit_session::{ConfigurationError, SessionConfig};
use authkit_thirdparty::{SignInUp, SignInUpPost, ThirdPartyConfig};
use authkit_userroles::UserRolesConfig;

use crate::config::{ApiConfig, MAX_TTL_SECS};

/// Every recipe enabled, with one-account-per-email enforced across login methods.
pub fn build_kit(
    config: &ApiConfig,
    email_service: Arc<dyn EmailDeliveryService>,
) -> Result<AuthKit, ConfigurationError> {
    let accounts: Arc<dyn AccountStore> = Arc::new(InMemoryAccountStore::new());
    let app_info = AppInfo::new(
        config.app_name.clone(),
        config.api_domain.clone(),
        config.website_domain.clone(),
    )
    .with_website_base_path(config.website_base_path.clone());

    AuthKit::builder(app_info)
        .account_store(accounts.clone())
        .email_service(email_service)
        .session(SessionConfig {
            session_ttl: secs(config.session_ttl_secs),
            ..SessionConfig::default()
        })
        .email_password(EmailPasswordConfig {
            functions: OverrideRegistry::new()
                .with::<SignUp>(deny_email_password_when_email_exists(accounts.clone())),
            reset_token_ttl: secs(config.password_reset_token_ttl_secs),
            ..EmailPasswordConfig::default()
        })
        .third_party(ThirdPartyConfig {
            functions: OverrideRegistry::new()
                .with::<SignInUp>(deny_third_party_when_email_exists(accounts)),
            apis: OverrideRegistry::new().with::<SignInUpPost>(general_error_on_sign_in_up_not_allowed()),
        })
        .email_verification(EmailVerificationConfig {
            mode: config.email_verification,
            ..EmailVerificationConfig::default()
        })
        .user_roles(UserRolesConfig::default())
        .build()
}

fn secs(value: u64) -> Duration {
    let capped = value.min(MAX_TTL_SECS);
    Duration::seconds(i64::try_from(capped).unwrap_or(0))
}
