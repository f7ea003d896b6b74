//! `authkit-emailpassword` — sign-up/sign-in with email and password, plus password
//! reset.
//!
//! Every function, API handler and the reset email delivery is an overridable
//! operation; see [`EmailPasswordConfig`].

pub mod api;
pub mod delivery;
pub mod form;
pub mod functions;
pub mod recipe;
pub mod token;

pub use api::{
    Apis, EmailExistsGet, EmailExistsGetInput, GeneratePasswordResetTokenPost,
    GeneratePasswordResetTokenPostInput, GeneratePasswordResetTokenPostResult, PasswordResetPost,
    PasswordResetPostInput, PasswordResetPostResult, SignInPost, SignInPostInput, SignInPostResult,
    SignUpPost, SignUpPostInput, SignUpPostResult,
};
pub use delivery::SendEmail;
pub use form::{FieldError, FormField};
pub use functions::{
    ConsumePasswordResetToken, ConsumePasswordResetTokenInput, ConsumePasswordResetTokenResult,
    CreateResetPasswordToken, CreateResetPasswordTokenInput, CreateResetPasswordTokenResult,
    Functions, SignIn, SignInInput, SignInResult, SignUp, SignUpInput, SignUpResult,
    UpdateEmailOrPassword, UpdateEmailOrPasswordInput, UpdateEmailOrPasswordResult,
};
pub use recipe::{EmailPasswordConfig, EmailPasswordDeps, EmailPasswordRecipe};
