//! Fault model shared by recipe implementations.
//!
//! `AuthError` is for *faults*: a collaborator failed, configuration is broken, input
//! could not even be parsed. Expected business outcomes ("email already exists",
//! "wrong credentials") are never errors; each operation returns them as variants of
//! its own result enum so the API boundary can match them exhaustively.

use thiserror::Error;

/// Result type used across recipe implementations.
pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// A value could not be parsed (e.g. malformed identifier).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The account/session/token store failed.
    #[error("store error: {0}")]
    Store(String),

    /// The email/SMS delivery collaborator failed.
    #[error("delivery error: {0}")]
    Delivery(String),

    /// The SDK was wired incorrectly.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An operation referenced a user that does not exist.
    #[error("unknown user: {0}")]
    UnknownUser(String),

    /// Anything else (hashing failures, poisoned locks, ...).
    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    pub fn delivery(msg: impl Into<String>) -> Self {
        Self::Delivery(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn unknown_user(msg: impl Into<String>) -> Self {
        Self::UnknownUser(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
