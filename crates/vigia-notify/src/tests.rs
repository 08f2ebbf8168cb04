use crate::channels::inapp::InAppChannel;
use crate::channels::push::{
    aggregate_subscription_outcomes, PushChannel, PushSendError, PushTransport,
    SubscriptionOutcome,
};
use crate::dispatch::{AlertDispatch, DispatchOrchestrator, ManualDispatch};
use crate::error::Result;
use crate::template::MessageTemplate;
use crate::{
    DeliveryOutcome, InAppFeed, MessageOrigin, NotificationChannel, OutboundMessage, Recipient,
    RecipientDirectory, SubscriptionGc, WebPushEndpoint,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use vigia_common::types::{
    AlertConfig, AlertKind, AlertPayload, AlertRecord, Channel, NotificationKind, Severity,
};
use web_push::WebPushMessage;

fn recipient(user_id: &str, email: Option<&str>, endpoints: &[&str]) -> Recipient {
    Recipient {
        user_id: user_id.to_string(),
        display_name: format!("User {user_id}"),
        email: email.map(str::to_string),
        subscriptions: endpoints
            .iter()
            .map(|e| WebPushEndpoint {
                endpoint: e.to_string(),
                p256dh_key: "BNcRdreALRFXTkOOUHK1EtK2wtaz5Ry4YfYCA_0QTpQtUbVlUls0VJXg7A8u-Ts1XbjhazAkj7I99e8QcYP7DkM".to_string(),
                auth_key: "tBHItJI5svbpez7KI4CCXg".to_string(),
            })
            .collect(),
    }
}

fn alert(id: &str) -> AlertRecord {
    AlertRecord {
        id: id.to_string(),
        kind: AlertKind::EthicsApprovalPending,
        title: "Ethics approval pending".to_string(),
        message: "Hospital General Sur has been waiting 21 days".to_string(),
        severity: Severity::Medium,
        hospital_id: Some("h-1".to_string()),
        project_id: None,
        payload: AlertPayload::EthicsPending { days_pending: 21 },
        is_resolved: false,
        created_at: Utc::now(),
        resolved_at: None,
    }
}

fn config(auto_send_email: bool) -> AlertConfig {
    AlertConfig {
        alert_type: AlertKind::EthicsApprovalPending,
        enabled: true,
        notify_admin: true,
        notify_coordinator: false,
        auto_send_email,
        threshold_value: Some(14),
        email_template_id: None,
    }
}

// ---- mocks ----

struct FixedDirectory {
    admins: Vec<Recipient>,
}

#[async_trait]
impl RecipientDirectory for FixedDirectory {
    async fn active_admins(&self) -> Result<Vec<Recipient>> {
        Ok(self.admins.clone())
    }

    async fn coordinators_for(
        &self,
        _hospital_id: Option<&str>,
        _project_id: Option<&str>,
    ) -> Result<Vec<Recipient>> {
        Ok(Vec::new())
    }

    async fn recipients_by_ids(&self, ids: &[String]) -> Result<Vec<Recipient>> {
        Ok(self
            .admins
            .iter()
            .filter(|r| ids.contains(&r.user_id))
            .cloned()
            .collect())
    }
}

#[derive(Default)]
struct RecordingFeed {
    notifications: Mutex<Vec<(String, String, NotificationKind)>>,
    communications: Mutex<Vec<(String, String, String)>>,
}

#[async_trait]
impl InAppFeed for RecordingFeed {
    async fn push_notification(
        &self,
        user_id: &str,
        title: &str,
        _message: &str,
        kind: NotificationKind,
    ) -> Result<()> {
        self.notifications
            .lock()
            .unwrap()
            .push((user_id.to_string(), title.to_string(), kind));
        Ok(())
    }

    async fn record_communication(
        &self,
        sender_id: &str,
        recipient_id: &str,
        subject: &str,
        _body: &str,
        _hospital_id: Option<&str>,
        _project_id: Option<&str>,
    ) -> Result<()> {
        self.communications.lock().unwrap().push((
            sender_id.to_string(),
            recipient_id.to_string(),
            subject.to_string(),
        ));
        Ok(())
    }
}

#[derive(Default)]
struct RecordingGc {
    removed: Mutex<Vec<String>>,
}

#[async_trait]
impl SubscriptionGc for RecordingGc {
    async fn remove_stale(&self, endpoint: &str) -> Result<bool> {
        self.removed.lock().unwrap().push(endpoint.to_string());
        Ok(true)
    }
}

/// Push transport scripted by endpoint substring.
struct ScriptedTransport;

#[async_trait]
impl PushTransport for ScriptedTransport {
    async fn send(&self, message: WebPushMessage) -> std::result::Result<(), PushSendError> {
        let endpoint = message.endpoint.to_string();
        if endpoint.contains("gone") {
            Err(PushSendError::Gone)
        } else if endpoint.contains("error") {
            Err(PushSendError::Failed("503 from push service".to_string()))
        } else {
            Ok(())
        }
    }
}

/// Channel double that fails for a chosen set of users.
struct ScriptedChannel {
    channel: Channel,
    fail_users: HashSet<String>,
}

#[async_trait]
impl NotificationChannel for ScriptedChannel {
    fn channel(&self) -> Channel {
        self.channel
    }

    async fn deliver(&self, _message: &OutboundMessage, recipient: &Recipient) -> DeliveryOutcome {
        if self.fail_users.contains(&recipient.user_id) {
            DeliveryOutcome::failed("scripted failure")
        } else {
            DeliveryOutcome::Sent
        }
    }
}

fn alert_message() -> OutboundMessage {
    OutboundMessage {
        subject: "Subject".to_string(),
        body: "Body".to_string(),
        origin: MessageOrigin::Alert {
            alert_id: "a-1".to_string(),
            severity: Severity::High,
        },
    }
}

// ---- push channel ----

#[tokio::test]
async fn stale_endpoint_is_deleted_and_other_devices_still_receive() {
    let gc = Arc::new(RecordingGc::default());
    let channel =
        PushChannel::with_transport(ScriptedTransport, gc.clone(), None, None, 5);

    let r = recipient(
        "u-1",
        None,
        &["https://push.example/gone/1", "https://push.example/ok/2"],
    );
    let outcome = channel.deliver(&alert_message(), &r).await;

    // One device was stale, the other got the push: the recipient counts
    // as delivered and exactly the stale row was removed.
    assert_eq!(outcome, DeliveryOutcome::Sent);
    let removed = gc.removed.lock().unwrap().clone();
    assert_eq!(removed, vec!["https://push.example/gone/1".to_string()]);
}

#[tokio::test]
async fn all_stale_is_skipped_not_failed() {
    let gc = Arc::new(RecordingGc::default());
    let channel =
        PushChannel::with_transport(ScriptedTransport, gc.clone(), None, None, 5);

    let r = recipient("u-1", None, &["https://push.example/gone/1"]);
    let outcome = channel.deliver(&alert_message(), &r).await;

    assert_eq!(outcome, DeliveryOutcome::skipped("stale"));
    assert_eq!(gc.removed.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn push_without_subscriptions_is_skipped() {
    let gc = Arc::new(RecordingGc::default());
    let channel = PushChannel::with_transport(ScriptedTransport, gc, None, None, 5);

    let r = recipient("u-1", None, &[]);
    let outcome = channel.deliver(&alert_message(), &r).await;
    assert_eq!(outcome, DeliveryOutcome::skipped("no_subscription"));
}

#[tokio::test]
async fn failed_endpoint_is_retained() {
    let gc = Arc::new(RecordingGc::default());
    let channel =
        PushChannel::with_transport(ScriptedTransport, gc.clone(), None, None, 5);

    let r = recipient("u-1", None, &["https://push.example/error/1"]);
    let outcome = channel.deliver(&alert_message(), &r).await;

    assert!(matches!(outcome, DeliveryOutcome::Failed { .. }));
    assert!(gc.removed.lock().unwrap().is_empty());
}

#[test]
fn subscription_outcome_aggregation() {
    use SubscriptionOutcome::*;
    assert_eq!(
        aggregate_subscription_outcomes(&[]),
        DeliveryOutcome::skipped("no_subscription")
    );
    assert_eq!(
        aggregate_subscription_outcomes(&[Stale, Sent]),
        DeliveryOutcome::Sent
    );
    assert_eq!(
        aggregate_subscription_outcomes(&[Stale, Stale]),
        DeliveryOutcome::skipped("stale")
    );
    assert!(matches!(
        aggregate_subscription_outcomes(&[Stale, Failed("x".into())]),
        DeliveryOutcome::Failed { .. }
    ));
}

// ---- orchestrator ----

#[tokio::test]
async fn channel_failures_are_isolated_per_recipient_and_channel() {
    let directory = Arc::new(FixedDirectory {
        admins: vec![
            recipient("u-1", Some("u1@example.org"), &[]),
            recipient("u-2", Some("u2@example.org"), &[]),
        ],
    });
    let mut fail_users = HashSet::new();
    fail_users.insert("u-1".to_string());
    let email = Arc::new(ScriptedChannel {
        channel: Channel::Email,
        fail_users,
    });
    let inapp = Arc::new(ScriptedChannel {
        channel: Channel::InApp,
        fail_users: HashSet::new(),
    });
    let orchestrator = DispatchOrchestrator::new(directory, vec![email, inapp], 4);

    let a = alert("a-1");
    let cfg = config(true);
    let result = orchestrator
        .dispatch_alert(AlertDispatch {
            alert: &a,
            config: &cfg,
            template: None,
            hospital_name: None,
            project_name: None,
        })
        .await
        .unwrap();

    // 2 recipients x 3 channels (in_app, push, email).
    assert_eq!(result.deliveries.len(), 6);

    let outcome_of = |user: &str, channel: Channel| {
        result
            .deliveries
            .iter()
            .find(|d| d.user_id == user && d.channel == channel)
            .map(|d| d.outcome.clone())
            .expect("delivery present")
    };

    // Email failed for u-1 only; u-1's in-app delivery and u-2's email are
    // untouched. Push has no registered channel and is skipped for both.
    assert!(matches!(
        outcome_of("u-1", Channel::Email),
        DeliveryOutcome::Failed { .. }
    ));
    assert_eq!(outcome_of("u-1", Channel::InApp), DeliveryOutcome::Sent);
    assert_eq!(outcome_of("u-2", Channel::Email), DeliveryOutcome::Sent);
    assert_eq!(
        outcome_of("u-2", Channel::Push),
        DeliveryOutcome::skipped("channel_not_configured")
    );
}

#[tokio::test]
async fn alert_without_template_falls_back_to_raw_title_and_message() {
    let directory = Arc::new(FixedDirectory {
        admins: vec![recipient("u-1", None, &[])],
    });
    let feed = Arc::new(RecordingFeed::default());
    let inapp = Arc::new(InAppChannel::new(feed.clone()));
    let orchestrator = DispatchOrchestrator::new(directory, vec![inapp], 4);

    let a = alert("a-1");
    let cfg = config(false);
    orchestrator
        .dispatch_alert(AlertDispatch {
            alert: &a,
            config: &cfg,
            template: None,
            hospital_name: None,
            project_name: None,
        })
        .await
        .unwrap();

    let notifications = feed.notifications.lock().unwrap().clone();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].1, "Ethics approval pending");
    // Medium severity lands as a warning in the feed.
    assert_eq!(notifications[0].2, NotificationKind::Warning);
}

#[tokio::test]
async fn alert_with_template_renders_payload_variables() {
    let directory = Arc::new(FixedDirectory {
        admins: vec![recipient("u-1", None, &[])],
    });
    let feed = Arc::new(RecordingFeed::default());
    let inapp = Arc::new(InAppChannel::new(feed.clone()));
    let orchestrator = DispatchOrchestrator::new(directory, vec![inapp], 4);

    let a = alert("a-1");
    let cfg = config(false);
    let template = MessageTemplate {
        subject: "[{{severity}}] {{hospital_name}}: {{days_pending}} days".to_string(),
        body: "{{message}}".to_string(),
        declared: vec![
            "severity".into(),
            "hospital_name".into(),
            "days_pending".into(),
            "message".into(),
        ],
    };
    orchestrator
        .dispatch_alert(AlertDispatch {
            alert: &a,
            config: &cfg,
            template: Some(&template),
            hospital_name: Some("General Sur"),
            project_name: None,
        })
        .await
        .unwrap();

    let notifications = feed.notifications.lock().unwrap().clone();
    assert_eq!(notifications[0].1, "[medium] General Sur: 21 days");
}

#[tokio::test]
async fn zero_recipients_is_an_outcome_not_an_error() {
    let directory = Arc::new(FixedDirectory { admins: vec![] });
    let orchestrator = DispatchOrchestrator::new(directory, vec![], 4);

    let a = alert("a-1");
    let cfg = config(false);
    let result = orchestrator
        .dispatch_alert(AlertDispatch {
            alert: &a,
            config: &cfg,
            template: None,
            hospital_name: None,
            project_name: None,
        })
        .await
        .unwrap();
    assert!(result.deliveries.is_empty());
}

#[tokio::test]
async fn manual_dispatch_writes_communications_for_explicit_recipients() {
    let directory = Arc::new(FixedDirectory {
        admins: vec![
            recipient("u-1", Some("u1@example.org"), &[]),
            recipient("u-2", None, &[]),
        ],
    });
    let feed = Arc::new(RecordingFeed::default());
    let inapp = Arc::new(InAppChannel::new(feed.clone()));
    let orchestrator = DispatchOrchestrator::new(directory, vec![inapp], 4);

    let ids = vec!["u-2".to_string(), "u-2".to_string(), "u-404".to_string()];
    let result = orchestrator
        .dispatch_manual(ManualDispatch {
            batch_id: "b-1",
            sender_id: "admin-1",
            recipient_ids: &ids,
            subject: "Protocol amendment",
            body: "Please review before Friday.",
            channels: &[],
            hospital_id: None,
            project_id: None,
        })
        .await
        .unwrap();

    // Duplicate and unknown IDs collapse; the in-app record is the
    // communication inbox, not the notification feed.
    assert_eq!(result.deliveries.len(), 1);
    let communications = feed.communications.lock().unwrap().clone();
    assert_eq!(
        communications,
        vec![(
            "admin-1".to_string(),
            "u-2".to_string(),
            "Protocol amendment".to_string()
        )]
    );
    assert!(feed.notifications.lock().unwrap().is_empty());
}
