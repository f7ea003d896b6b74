//! Email delivery collaborator.
//!
//! Recipes never talk to SMTP directly: they build an [`EmailDeliveryInput`] and hand
//! it to whatever [`EmailDeliveryService`] the app wired in.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::{AuthError, AuthResult, RequestContext, TenantId, UserId};

/// Template variables for one outgoing email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EmailDeliveryInput {
    PasswordReset {
        tenant_id: TenantId,
        user_id: UserId,
        email: String,
        password_reset_link: String,
    },
    EmailVerification {
        tenant_id: TenantId,
        user_id: UserId,
        email: String,
        email_verify_link: String,
    },
}

impl EmailDeliveryInput {
    pub fn recipient(&self) -> &str {
        match self {
            EmailDeliveryInput::PasswordReset { email, .. } => email,
            EmailDeliveryInput::EmailVerification { email, .. } => email,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            EmailDeliveryInput::PasswordReset { .. } => "password_reset",
            EmailDeliveryInput::EmailVerification { .. } => "email_verification",
        }
    }
}

#[async_trait::async_trait]
pub trait EmailDeliveryService: Send + Sync {
    async fn send(&self, input: EmailDeliveryInput, ctx: &RequestContext) -> AuthResult<()>;
}

/// Dev default: records the email in the log instead of sending it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingEmailService;

#[async_trait::async_trait]
impl EmailDeliveryService for LoggingEmailService {
    async fn send(&self, input: EmailDeliveryInput, ctx: &RequestContext) -> AuthResult<()> {
        tracing::info!(
            request_id = %ctx.request_id(),
            kind = input.kind(),
            to = input.recipient(),
            "email delivery (logging only)"
        );
        Ok(())
    }
}

/// Keeps every email in memory; used by tests and local tooling.
#[derive(Debug, Default)]
pub struct InMemoryEmailOutbox {
    sent: Mutex<Vec<EmailDeliveryInput>>,
}

impl InMemoryEmailOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<EmailDeliveryInput> {
        match self.sent.lock() {
            Ok(sent) => sent.clone(),
            Err(_) => Vec::new(),
        }
    }
}

#[async_trait::async_trait]
impl EmailDeliveryService for InMemoryEmailOutbox {
    async fn send(&self, input: EmailDeliveryInput, _ctx: &RequestContext) -> AuthResult<()> {
        self.sent
            .lock()
            .map_err(|_| AuthError::delivery("outbox lock poisoned"))?
            .push(input);
        Ok(())
    }
}
