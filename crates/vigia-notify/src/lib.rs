//! Notification delivery framework with per-channel failure isolation.
//!
//! Alerts and manual communications are fanned out by the
//! [`dispatch::DispatchOrchestrator`] across the registered
//! [`NotificationChannel`] implementations (email over SMTP, browser push,
//! in-app feed). Channels never raise: every delivery attempt collapses to a
//! [`DeliveryOutcome`] so one failing recipient or channel cannot block the
//! rest of a dispatch.
//!
//! The orchestrator reaches persistence only through the narrow seam traits
//! ([`RecipientDirectory`], [`InAppFeed`], [`SubscriptionGc`]); the server
//! provides store-backed implementations.

pub mod channels;
pub mod dispatch;
pub mod error;
pub mod template;
pub mod utils;

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use vigia_common::types::{Channel, NotificationKind, Severity};

use crate::error::Result;

/// One browser/device push endpoint belonging to a recipient.
#[derive(Debug, Clone)]
pub struct WebPushEndpoint {
    pub endpoint: String,
    pub p256dh_key: String,
    pub auth_key: String,
}

/// A resolved recipient with every channel-specific address attached.
#[derive(Debug, Clone)]
pub struct Recipient {
    pub user_id: String,
    pub display_name: String,
    pub email: Option<String>,
    pub subscriptions: Vec<WebPushEndpoint>,
}

/// What a delivered message originated from. Drives the in-app channel's
/// choice between the notification feed and the communication inbox.
#[derive(Debug, Clone)]
pub enum MessageOrigin {
    Alert {
        alert_id: String,
        severity: Severity,
    },
    Manual {
        batch_id: String,
        sender_id: String,
        hospital_id: Option<String>,
        project_id: Option<String>,
    },
}

/// A fully rendered message ready for channel delivery.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub subject: String,
    pub body: String,
    pub origin: MessageOrigin,
}

/// Per-(channel, recipient) delivery outcome. Channels report, never throw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Sent,
    Failed { reason: String },
    Skipped { reason: String },
}

impl DeliveryOutcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        DeliveryOutcome::Failed {
            reason: reason.into(),
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        DeliveryOutcome::Skipped {
            reason: reason.into(),
        }
    }

    pub fn status_str(&self) -> &'static str {
        match self {
            DeliveryOutcome::Sent => "sent",
            DeliveryOutcome::Failed { .. } => "failed",
            DeliveryOutcome::Skipped { .. } => "skipped",
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            DeliveryOutcome::Sent => None,
            DeliveryOutcome::Failed { reason } | DeliveryOutcome::Skipped { reason } => {
                Some(reason)
            }
        }
    }
}

/// A notification delivery channel.
///
/// `deliver` must be total: transport errors, bad addresses, and stale
/// endpoints are all folded into the returned [`DeliveryOutcome`].
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Which channel this implementation serves.
    fn channel(&self) -> Channel;

    /// Delivers one rendered message to one recipient.
    async fn deliver(&self, message: &OutboundMessage, recipient: &Recipient) -> DeliveryOutcome;
}

/// Resolves notification policies to concrete recipients.
#[async_trait]
pub trait RecipientDirectory: Send + Sync {
    /// All active administrators.
    async fn active_admins(&self) -> Result<Vec<Recipient>>;

    /// Active coordinators of the target hospital, or of every hospital of
    /// the target project when only a project is given.
    async fn coordinators_for(
        &self,
        hospital_id: Option<&str>,
        project_id: Option<&str>,
    ) -> Result<Vec<Recipient>>;

    /// Recipients for an explicit ID list (manual sends). Unknown IDs are
    /// silently dropped.
    async fn recipients_by_ids(&self, ids: &[String]) -> Result<Vec<Recipient>>;
}

/// Write side of the in-app channel.
#[async_trait]
pub trait InAppFeed: Send + Sync {
    async fn push_notification(
        &self,
        user_id: &str,
        title: &str,
        message: &str,
        kind: NotificationKind,
    ) -> Result<()>;

    async fn record_communication(
        &self,
        sender_id: &str,
        recipient_id: &str,
        subject: &str,
        body: &str,
        hospital_id: Option<&str>,
        project_id: Option<&str>,
    ) -> Result<()>;
}

/// Removes push subscriptions the push service has declared dead (410/404).
#[async_trait]
pub trait SubscriptionGc: Send + Sync {
    /// Atomic delete by endpoint. Returns true when a row was removed.
    async fn remove_stale(&self, endpoint: &str) -> Result<bool>;
}
