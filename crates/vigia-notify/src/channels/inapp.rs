use crate::utils::{truncate_string, MAX_REASON_LENGTH};
use crate::{
    DeliveryOutcome, InAppFeed, MessageOrigin, NotificationChannel, OutboundMessage, Recipient,
};
use async_trait::async_trait;
use std::sync::Arc;
use vigia_common::types::{Channel, NotificationKind};

/// In-app delivery: alerts land in the recipient's notification feed,
/// manual sends in their communication inbox. The only failure mode is an
/// unreachable data store, which the run reports as an error.
pub struct InAppChannel {
    feed: Arc<dyn InAppFeed>,
}

impl InAppChannel {
    pub fn new(feed: Arc<dyn InAppFeed>) -> Self {
        Self { feed }
    }
}

#[async_trait]
impl NotificationChannel for InAppChannel {
    fn channel(&self) -> Channel {
        Channel::InApp
    }

    async fn deliver(&self, message: &OutboundMessage, recipient: &Recipient) -> DeliveryOutcome {
        let result = match &message.origin {
            MessageOrigin::Alert { severity, .. } => {
                self.feed
                    .push_notification(
                        &recipient.user_id,
                        &message.subject,
                        &message.body,
                        NotificationKind::from_severity(*severity),
                    )
                    .await
            }
            MessageOrigin::Manual {
                sender_id,
                hospital_id,
                project_id,
                ..
            } => {
                self.feed
                    .record_communication(
                        sender_id,
                        &recipient.user_id,
                        &message.subject,
                        &message.body,
                        hospital_id.as_deref(),
                        project_id.as_deref(),
                    )
                    .await
            }
        };

        match result {
            Ok(()) => DeliveryOutcome::Sent,
            Err(e) => {
                tracing::error!(
                    recipient = %recipient.user_id,
                    error = %e,
                    "In-app write failed"
                );
                DeliveryOutcome::failed(truncate_string(&e.to_string(), MAX_REASON_LENGTH))
            }
        }
    }
}
