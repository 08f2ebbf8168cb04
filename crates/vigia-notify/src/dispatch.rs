use crate::error::Result;
use crate::template::{self, MessageTemplate, Rendered};
use crate::{
    DeliveryOutcome, MessageOrigin, NotificationChannel, OutboundMessage, Recipient,
    RecipientDirectory,
};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use vigia_common::types::{AlertConfig, AlertRecord, Channel};

/// One alert ready for fan-out, with everything the renderer needs already
/// loaded by the caller.
pub struct AlertDispatch<'a> {
    pub alert: &'a AlertRecord,
    pub config: &'a AlertConfig,
    /// Configured email template; the alert's raw title/message are the
    /// fallback when none is set.
    pub template: Option<&'a MessageTemplate>,
    pub hospital_name: Option<&'a str>,
    pub project_name: Option<&'a str>,
}

/// A manual communication from an administrator, bypassing the rule engine.
pub struct ManualDispatch<'a> {
    pub batch_id: &'a str,
    pub sender_id: &'a str,
    pub recipient_ids: &'a [String],
    pub subject: &'a str,
    pub body: &'a str,
    pub channels: &'a [Channel],
    pub hospital_id: Option<&'a str>,
    pub project_id: Option<&'a str>,
}

/// One per-(channel, recipient) outcome of a dispatch.
#[derive(Debug, Clone)]
pub struct ChannelDelivery {
    pub channel: Channel,
    pub user_id: String,
    pub outcome: DeliveryOutcome,
}

/// Everything a dispatch produced, for the audit trail.
#[derive(Debug, Default)]
pub struct DispatchResult {
    pub deliveries: Vec<ChannelDelivery>,
}

impl DispatchResult {
    pub fn count(&self, status: &str) -> usize {
        self.deliveries
            .iter()
            .filter(|d| d.outcome.status_str() == status)
            .count()
    }
}

/// Template variables for an alert: the alert's own fields plus the
/// flattened rule payload and resolved entity names.
pub fn alert_template_vars(
    alert: &AlertRecord,
    hospital_name: Option<&str>,
    project_name: Option<&str>,
) -> HashMap<String, String> {
    let mut vars = HashMap::new();
    vars.insert("title".to_string(), alert.title.clone());
    vars.insert("message".to_string(), alert.message.clone());
    vars.insert("severity".to_string(), alert.severity.to_string());
    vars.insert("alert_type".to_string(), alert.kind.to_string());
    if let Some(name) = hospital_name {
        vars.insert("hospital_name".to_string(), name.to_string());
    }
    if let Some(name) = project_name {
        vars.insert("project_name".to_string(), name.to_string());
    }
    for (name, value) in alert.payload.template_vars() {
        vars.insert(name.to_string(), value);
    }
    vars
}

/// Fans one alert or manual communication out to all resolved recipients
/// across the enabled channels.
///
/// Channel failures are isolated per channel and per recipient and come back
/// as recorded outcomes. The orchestrator itself only errors when the
/// recipient directory cannot be queried at all.
pub struct DispatchOrchestrator {
    directory: Arc<dyn RecipientDirectory>,
    channels: Vec<Arc<dyn NotificationChannel>>,
    max_in_flight: usize,
}

impl DispatchOrchestrator {
    pub fn new(
        directory: Arc<dyn RecipientDirectory>,
        channels: Vec<Arc<dyn NotificationChannel>>,
        max_in_flight: usize,
    ) -> Self {
        Self {
            directory,
            channels,
            max_in_flight: max_in_flight.max(1),
        }
    }

    fn channel_impl(&self, channel: Channel) -> Option<&Arc<dyn NotificationChannel>> {
        self.channels.iter().find(|c| c.channel() == channel)
    }

    pub async fn dispatch_alert(&self, request: AlertDispatch<'_>) -> Result<DispatchResult> {
        let mut recipients = Vec::new();
        if request.config.notify_admin {
            recipients.extend(self.directory.active_admins().await?);
        }
        if request.config.notify_coordinator {
            recipients.extend(
                self.directory
                    .coordinators_for(
                        request.alert.hospital_id.as_deref(),
                        request.alert.project_id.as_deref(),
                    )
                    .await?,
            );
        }
        let recipients = dedup_by_user(recipients);

        if recipients.is_empty() {
            // The alert row already records the violation; an empty audience
            // is an outcome, not an error.
            tracing::info!(
                alert_id = %request.alert.id,
                alert_type = request.alert.kind.as_str(),
                "No recipients resolved for alert"
            );
            return Ok(DispatchResult::default());
        }

        let rendered = match request.template {
            Some(template) => {
                let vars = alert_template_vars(
                    request.alert,
                    request.hospital_name,
                    request.project_name,
                );
                template::render(template, &vars)
            }
            None => Rendered {
                subject: request.alert.title.clone(),
                body: request.alert.message.clone(),
            },
        };

        let message = OutboundMessage {
            subject: rendered.subject,
            body: rendered.body,
            origin: MessageOrigin::Alert {
                alert_id: request.alert.id.clone(),
                severity: request.alert.severity,
            },
        };

        // In-app always; push is always attempted (the channel skips
        // recipients without a subscription); email only when configured.
        let mut wanted = vec![Channel::InApp, Channel::Push];
        if request.config.auto_send_email {
            wanted.push(Channel::Email);
        }

        Ok(self.fan_out(&message, recipients, &wanted).await)
    }

    pub async fn dispatch_manual(&self, request: ManualDispatch<'_>) -> Result<DispatchResult> {
        let recipients = dedup_by_user(
            self.directory
                .recipients_by_ids(request.recipient_ids)
                .await?,
        );

        if recipients.is_empty() {
            tracing::info!(
                batch_id = %request.batch_id,
                "No recipients resolved for manual communication"
            );
            return Ok(DispatchResult::default());
        }

        let message = OutboundMessage {
            subject: request.subject.to_string(),
            body: request.body.to_string(),
            origin: MessageOrigin::Manual {
                batch_id: request.batch_id.to_string(),
                sender_id: request.sender_id.to_string(),
                hospital_id: request.hospital_id.map(str::to_string),
                project_id: request.project_id.map(str::to_string),
            },
        };

        // The in-app record is always written; the caller picks the rest.
        let mut wanted = vec![Channel::InApp];
        for channel in request.channels {
            if !wanted.contains(channel) {
                wanted.push(*channel);
            }
        }

        Ok(self.fan_out(&message, recipients, &wanted).await)
    }

    async fn fan_out(
        &self,
        message: &OutboundMessage,
        recipients: Vec<Recipient>,
        wanted: &[Channel],
    ) -> DispatchResult {
        let per_recipient: Vec<Vec<ChannelDelivery>> = stream::iter(recipients)
            .map(|recipient| async move {
                let mut deliveries = Vec::with_capacity(wanted.len());
                for channel in wanted {
                    let outcome = match self.channel_impl(*channel) {
                        Some(sender) => sender.deliver(message, &recipient).await,
                        None => DeliveryOutcome::skipped("channel_not_configured"),
                    };
                    deliveries.push(ChannelDelivery {
                        channel: *channel,
                        user_id: recipient.user_id.clone(),
                        outcome,
                    });
                }
                deliveries
            })
            .buffer_unordered(self.max_in_flight)
            .collect()
            .await;

        DispatchResult {
            deliveries: per_recipient.into_iter().flatten().collect(),
        }
    }
}

fn dedup_by_user(recipients: Vec<Recipient>) -> Vec<Recipient> {
    let mut seen = std::collections::HashSet::new();
    recipients
        .into_iter()
        .filter(|r| seen.insert(r.user_id.clone()))
        .collect()
}
