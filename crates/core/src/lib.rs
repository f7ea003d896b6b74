//! `authkit-core` — shared building blocks for every recipe.
//!
//! Identifiers, the account model, the per-request context and the narrow traits
//! of the external collaborators (account store, email delivery). No transport, no
//! persistence beyond the in-memory defaults.

pub mod account;
pub mod app_info;
pub mod context;
pub mod email;
pub mod error;
pub mod id;
pub mod token;

pub use account::{
    AccountInfo, AccountStore, CreateUserOutcome, InMemoryAccountStore, LoginMethod, ThirdPartyInfo,
    UpdateUserOutcome, User, normalize_email,
};
pub use app_info::AppInfo;
pub use context::RequestContext;
pub use email::{EmailDeliveryInput, EmailDeliveryService, InMemoryEmailOutbox, LoggingEmailService};
pub use error::{AuthError, AuthResult};
pub use id::{SessionId, TenantId, UserId};
pub use token::random_token;
