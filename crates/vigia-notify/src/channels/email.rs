use crate::error::NotifyError;
use crate::utils::{truncate_string, MAX_REASON_LENGTH};
use crate::{DeliveryOutcome, NotificationChannel, OutboundMessage, Recipient};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;
use vigia_common::types::Channel;

/// Transactional email over SMTP.
///
/// One message per recipient, no retries within a dispatch pass: provider
/// rejections and transport errors are both reported as `failed` with the
/// provider detail and left to the audit trail.
pub struct EmailChannel {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl EmailChannel {
    pub fn new(
        smtp_host: &str,
        smtp_port: u16,
        username: Option<&str>,
        password: Option<&str>,
        from: &str,
        timeout_secs: u64,
    ) -> Result<Self, NotifyError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(smtp_host)
            .map_err(|e| NotifyError::Smtp(e.to_string()))?
            .port(smtp_port)
            .timeout(Some(Duration::from_secs(timeout_secs)));

        if let (Some(user), Some(pass)) = (username, password) {
            builder = builder.credentials(Credentials::new(user.to_string(), pass.to_string()));
        }

        Ok(Self {
            transport: builder.build(),
            from: from.to_string(),
        })
    }
}

#[async_trait]
impl NotificationChannel for EmailChannel {
    fn channel(&self) -> Channel {
        Channel::Email
    }

    async fn deliver(&self, message: &OutboundMessage, recipient: &Recipient) -> DeliveryOutcome {
        let Some(address) = recipient.email.as_deref() else {
            return DeliveryOutcome::skipped("no_email_address");
        };

        let from = match self.from.parse() {
            Ok(mailbox) => mailbox,
            Err(e) => {
                return DeliveryOutcome::failed(format!("invalid from address: {e}"));
            }
        };
        let to = match address.parse() {
            Ok(mailbox) => mailbox,
            Err(e) => {
                return DeliveryOutcome::failed(format!("invalid recipient address: {e}"));
            }
        };

        let email = match Message::builder()
            .from(from)
            .to(to)
            .subject(&message.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(message.body.clone())
        {
            Ok(email) => email,
            Err(e) => {
                return DeliveryOutcome::failed(format!("message build failed: {e}"));
            }
        };

        match self.transport.send(email).await {
            Ok(_) => DeliveryOutcome::Sent,
            Err(e) => {
                tracing::error!(
                    recipient = %recipient.user_id,
                    error = %e,
                    "Email send failed"
                );
                DeliveryOutcome::failed(truncate_string(&e.to_string(), MAX_REASON_LENGTH))
            }
        }
    }
}
