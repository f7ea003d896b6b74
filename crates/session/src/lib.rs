//! `authkit-session` — sessions and the session claims validation engine.
//!
//! A [`Claim`] is a named, independently refreshable fact stored in a session's
//! payload. A [`Validator`] is a pure predicate over one claim's value. The
//! [`ClaimsEngine`] refreshes stale claims on demand (each at most once per pass) and
//! evaluates validators in order, returning every failure.
//!
//! Transport-agnostic: token minting, cookies and anti-CSRF live elsewhere.

pub mod builtins;
pub mod claim;
pub mod engine;
pub mod error;
pub mod recipe;
pub mod session;
pub mod store;
pub mod validator;
pub mod value;

pub use builtins::{BooleanClaim, PrimitiveArrayClaim, PrimitiveClaim};
pub use claim::{Claim, ClaimFetcher, ClaimId, RefreshPolicy, fetcher_fn};
pub use engine::{ClaimsEngine, ClaimsEngineBuilder, ValidatorSet};
pub use error::{ClaimRefreshError, ConfigurationError, SessionError, SessionLifetimeError};
pub use recipe::{
    CreateNewSession, CreateNewSessionInput, SessionConfig, SessionRecipe, VerifySessionOptions,
};
pub use session::Session;
pub use store::{InMemorySessionStore, SessionStore};
pub use validator::{ClaimCheck, FailureReason, ValidationFailure, Validator, ValidatorId};
pub use value::{ClaimStore, ClaimValue};
