//! `authkit-thirdparty` — sign-in/up with an external identity provider.
//!
//! The provider handshake is not handled here: callers pass the identity the provider
//! already vouched for.

pub mod api;
pub mod functions;
pub mod recipe;

pub use api::{Apis, SIGN_IN_UP_NOT_ALLOWED_REASON, SignInUpPost, SignInUpPostInput, SignInUpPostResult};
pub use functions::{Functions, SignInUp, SignInUpInput, SignInUpResult};
pub use recipe::{ThirdPartyConfig, ThirdPartyDeps, ThirdPartyRecipe};
