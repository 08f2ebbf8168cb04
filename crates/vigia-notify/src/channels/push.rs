use crate::error::NotifyError;
use crate::utils::{truncate_string, MAX_REASON_LENGTH};
use crate::{DeliveryOutcome, NotificationChannel, OutboundMessage, Recipient, SubscriptionGc};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use vigia_common::types::Channel;
use web_push::{
    ContentEncoding, IsahcWebPushClient, SubscriptionInfo, VapidSignatureBuilder, WebPushClient,
    WebPushError, WebPushMessage, WebPushMessageBuilder, URL_SAFE_NO_PAD,
};

/// How one push-service send ended, in the channel's own taxonomy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushSendError {
    /// The push service answered 410 Gone / 404 Not Found: the subscription
    /// no longer exists and must be removed.
    Gone,
    /// Any other failure; the subscription is retained.
    Failed(String),
}

/// Transport seam over the web-push client, so the channel logic (stale
/// cleanup, per-subscription isolation) is testable without a push service.
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn send(&self, message: WebPushMessage) -> Result<(), PushSendError>;
}

#[async_trait]
impl PushTransport for IsahcWebPushClient {
    async fn send(&self, message: WebPushMessage) -> Result<(), PushSendError> {
        WebPushClient::send(self, message).await.map_err(|e| match e {
            WebPushError::EndpointNotValid | WebPushError::EndpointNotFound => {
                PushSendError::Gone
            }
            other => PushSendError::Failed(other.to_string()),
        })
    }
}

/// Per-subscription result, before aggregation into the recipient outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SubscriptionOutcome {
    Sent,
    Stale,
    Failed(String),
}

/// Collapse the per-subscription results of one recipient: delivery to any
/// device counts as sent; a recipient whose endpoints were all stale is a
/// skip, not a failure.
pub(crate) fn aggregate_subscription_outcomes(results: &[SubscriptionOutcome]) -> DeliveryOutcome {
    if results.is_empty() {
        return DeliveryOutcome::skipped("no_subscription");
    }
    if results.iter().any(|r| *r == SubscriptionOutcome::Sent) {
        return DeliveryOutcome::Sent;
    }
    if results.iter().all(|r| *r == SubscriptionOutcome::Stale) {
        return DeliveryOutcome::skipped("stale");
    }
    let reasons: Vec<&str> = results
        .iter()
        .filter_map(|r| match r {
            SubscriptionOutcome::Failed(reason) => Some(reason.as_str()),
            _ => None,
        })
        .collect();
    DeliveryOutcome::failed(truncate_string(&reasons.join("; "), MAX_REASON_LENGTH))
}

/// Browser push over the Web Push protocol with VAPID signing.
///
/// Each of the recipient's subscriptions is sent independently: a stale
/// endpoint is deleted as a side effect and never blocks the recipient's
/// other devices.
pub struct PushChannel<T: PushTransport> {
    transport: T,
    gc: Arc<dyn SubscriptionGc>,
    vapid_private_key: Option<String>,
    vapid_subject: Option<String>,
    timeout: Duration,
}

impl PushChannel<IsahcWebPushClient> {
    pub fn new(
        gc: Arc<dyn SubscriptionGc>,
        vapid_private_key: Option<String>,
        vapid_subject: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self, NotifyError> {
        let client = IsahcWebPushClient::new().map_err(|e| NotifyError::Push(e.to_string()))?;
        Ok(Self::with_transport(
            client,
            gc,
            vapid_private_key,
            vapid_subject,
            timeout_secs,
        ))
    }
}

impl<T: PushTransport> PushChannel<T> {
    pub fn with_transport(
        transport: T,
        gc: Arc<dyn SubscriptionGc>,
        vapid_private_key: Option<String>,
        vapid_subject: Option<String>,
        timeout_secs: u64,
    ) -> Self {
        Self {
            transport,
            gc,
            vapid_private_key,
            vapid_subject,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    fn build_message(
        &self,
        info: &SubscriptionInfo,
        payload: &[u8],
    ) -> Result<WebPushMessage, String> {
        let mut builder = WebPushMessageBuilder::new(info);
        builder.set_payload(ContentEncoding::Aes128Gcm, payload);

        if let Some(key) = &self.vapid_private_key {
            let mut signature = VapidSignatureBuilder::from_base64(key, URL_SAFE_NO_PAD, info)
                .map_err(|e| format!("invalid VAPID key: {e}"))?;
            if let Some(subject) = &self.vapid_subject {
                signature.add_claim("sub", subject.clone());
            }
            let signature = signature
                .build()
                .map_err(|e| format!("VAPID signature failed: {e}"))?;
            builder.set_vapid_signature(signature);
        }

        builder.build().map_err(|e| e.to_string())
    }

    async fn send_one(&self, info: &SubscriptionInfo, payload: &[u8]) -> SubscriptionOutcome {
        let message = match self.build_message(info, payload) {
            Ok(message) => message,
            Err(reason) => return SubscriptionOutcome::Failed(reason),
        };

        match tokio::time::timeout(self.timeout, self.transport.send(message)).await {
            Err(_) => SubscriptionOutcome::Failed("push send timed out".to_string()),
            Ok(Ok(())) => SubscriptionOutcome::Sent,
            Ok(Err(PushSendError::Gone)) => SubscriptionOutcome::Stale,
            Ok(Err(PushSendError::Failed(reason))) => SubscriptionOutcome::Failed(reason),
        }
    }
}

#[async_trait]
impl<T: PushTransport> NotificationChannel for PushChannel<T> {
    fn channel(&self) -> Channel {
        Channel::Push
    }

    async fn deliver(&self, message: &OutboundMessage, recipient: &Recipient) -> DeliveryOutcome {
        if recipient.subscriptions.is_empty() {
            return DeliveryOutcome::skipped("no_subscription");
        }

        let payload = serde_json::json!({
            "title": message.subject,
            "body": message.body,
        })
        .to_string();

        let mut results = Vec::with_capacity(recipient.subscriptions.len());
        for subscription in &recipient.subscriptions {
            let info = SubscriptionInfo::new(
                subscription.endpoint.clone(),
                subscription.p256dh_key.clone(),
                subscription.auth_key.clone(),
            );
            let outcome = self.send_one(&info, payload.as_bytes()).await;

            if outcome == SubscriptionOutcome::Stale {
                tracing::info!(
                    endpoint = %subscription.endpoint,
                    user_id = %recipient.user_id,
                    "Push subscription is stale, removing"
                );
                if let Err(e) = self.gc.remove_stale(&subscription.endpoint).await {
                    tracing::error!(
                        endpoint = %subscription.endpoint,
                        error = %e,
                        "Failed to remove stale subscription"
                    );
                }
            }

            results.push(outcome);
        }

        aggregate_subscription_outcomes(&results)
    }
}
