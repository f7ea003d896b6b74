//! `authkit` — composition root wiring the session engine and every recipe together.
//!
//! ```ignore
//! let kit = AuthKit::builder(AppInfo::new("demo", "http://localhost:3001", "http://localhost:3000"))
//!     .email_password(EmailPasswordConfig::default())
//!     .user_roles(UserRolesConfig::default())
//!     .build()?;
//! ```

pub mod dedup;
pub mod kit;

pub use dedup::{
    ACCOUNT_EXISTS_MESSAGE, deny_email_password_when_email_exists, deny_third_party_when_email_exists,
    general_error_on_sign_in_up_not_allowed,
};
pub use kit::{AuthKit, AuthKitBuilder};

