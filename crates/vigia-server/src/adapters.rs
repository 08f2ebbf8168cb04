//! Store-backed implementations of the vigia-notify seam traits.
//!
//! The dispatch orchestrator only sees `RecipientDirectory`, `InAppFeed`,
//! and `SubscriptionGc`; everything here is a thin translation onto the
//! storage facade.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use vigia_common::types::NotificationKind;
use vigia_notify::error::{NotifyError, Result};
use vigia_notify::{InAppFeed, Recipient, RecipientDirectory, SubscriptionGc, WebPushEndpoint};
use vigia_storage::store::UserRow;
use vigia_storage::Store;

pub struct StoreDirectory(pub Arc<Store>);

impl StoreDirectory {
    /// Attach every user's push endpoints in one batched query.
    async fn to_recipients(&self, users: Vec<UserRow>) -> Result<Vec<Recipient>> {
        let ids: Vec<String> = users.iter().map(|u| u.id.clone()).collect();
        let subscriptions = self
            .0
            .list_push_subscriptions_for_users(&ids)
            .await
            .map_err(|e| NotifyError::Directory(e.to_string()))?;

        let mut by_user: HashMap<String, Vec<WebPushEndpoint>> = HashMap::new();
        for s in subscriptions {
            by_user
                .entry(s.user_id.clone())
                .or_default()
                .push(WebPushEndpoint {
                    endpoint: s.endpoint,
                    p256dh_key: s.p256dh_key,
                    auth_key: s.auth_key,
                });
        }

        Ok(users
            .into_iter()
            .map(|u| Recipient {
                subscriptions: by_user.remove(&u.id).unwrap_or_default(),
                user_id: u.id,
                display_name: u.display_name,
                email: u.email,
            })
            .collect())
    }
}

#[async_trait]
impl RecipientDirectory for StoreDirectory {
    async fn active_admins(&self) -> Result<Vec<Recipient>> {
        let users = self
            .0
            .list_active_admins()
            .await
            .map_err(|e| NotifyError::Directory(e.to_string()))?;
        self.to_recipients(users).await
    }

    async fn coordinators_for(
        &self,
        hospital_id: Option<&str>,
        project_id: Option<&str>,
    ) -> Result<Vec<Recipient>> {
        let hospital_ids = match (hospital_id, project_id) {
            (Some(hid), _) => vec![hid.to_string()],
            (None, Some(pid)) => self
                .0
                .hospital_ids_of_project(pid)
                .await
                .map_err(|e| NotifyError::Directory(e.to_string()))?,
            (None, None) => Vec::new(),
        };
        let users = self
            .0
            .list_active_coordinators_for_hospitals(&hospital_ids)
            .await
            .map_err(|e| NotifyError::Directory(e.to_string()))?;
        self.to_recipients(users).await
    }

    async fn recipients_by_ids(&self, ids: &[String]) -> Result<Vec<Recipient>> {
        let users = self
            .0
            .get_users_by_ids(ids)
            .await
            .map_err(|e| NotifyError::Directory(e.to_string()))?;
        let active: Vec<UserRow> = users.into_iter().filter(|u| u.active).collect();
        self.to_recipients(active).await
    }
}

pub struct StoreFeed(pub Arc<Store>);

#[async_trait]
impl InAppFeed for StoreFeed {
    async fn push_notification(
        &self,
        user_id: &str,
        title: &str,
        message: &str,
        kind: NotificationKind,
    ) -> Result<()> {
        self.0
            .insert_notification(user_id, title, message, kind)
            .await
            .map(|_| ())
            .map_err(|e| NotifyError::Storage(e.to_string()))
    }

    async fn record_communication(
        &self,
        sender_id: &str,
        recipient_id: &str,
        subject: &str,
        body: &str,
        hospital_id: Option<&str>,
        project_id: Option<&str>,
    ) -> Result<()> {
        self.0
            .insert_communication(sender_id, recipient_id, subject, body, hospital_id, project_id)
            .await
            .map(|_| ())
            .map_err(|e| NotifyError::Storage(e.to_string()))
    }
}

pub struct StoreGc(pub Arc<Store>);

#[async_trait]
impl SubscriptionGc for StoreGc {
    async fn remove_stale(&self, endpoint: &str) -> Result<bool> {
        self.0
            .delete_push_subscription_by_endpoint(endpoint)
            .await
            .map_err(|e| NotifyError::Storage(e.to_string()))
    }
}
