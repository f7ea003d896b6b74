use std::sync::Arc;

use authkit_core::{AuthResult, EmailDeliveryInput, EmailDeliveryService, RequestContext};
use authkit_overrides::{Handler, Operation};

/// Overridable: deliver a password reset email.
pub struct SendEmail;

impl Operation for SendEmail {
    const ID: &'static str = "emailpassword.send_email";
    type Input = EmailDeliveryInput;
    type Output = AuthResult<()>;
}

pub(crate) struct DefaultSendEmail {
    pub(crate) service: Arc<dyn EmailDeliveryService>,
}

#[async_trait::async_trait]
impl Handler<SendEmail> for DefaultSendEmail {
    async fn call(&self, input: EmailDeliveryInput, ctx: &RequestContext) -> AuthResult<()> {
        self.service.send(input, ctx).await
    }
}
