//! `authkit-emailverification` — email verification tokens and the `st-ev` claim.

pub mod api;
pub mod claim;
pub mod delivery;
pub mod functions;
pub mod recipe;
pub mod store;

pub use api::{
    Apis, GenerateEmailVerifyTokenPost, GenerateEmailVerifyTokenPostResult, IsEmailVerifiedGet,
    VerifyEmailPost, VerifyEmailPostInput, VerifyEmailPostResult,
};
pub use claim::{EMAIL_VERIFICATION_CLAIM_ID, email_verification_claim};
pub use delivery::SendEmail;
pub use functions::{
    CreateEmailVerificationToken, CreateEmailVerificationTokenInput,
    CreateEmailVerificationTokenResult, EmailOfUser, Functions, IsEmailVerified, UnverifyEmail,
    VerifyEmailUsingToken, VerifyEmailUsingTokenInput, VerifyEmailUsingTokenResult,
};
pub use recipe::{
    EmailVerificationConfig, EmailVerificationDeps, EmailVerificationInit, EmailVerificationMode,
    EmailVerificationRecipe,
};
