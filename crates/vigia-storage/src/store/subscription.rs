use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};

use crate::entities::push_subscription::{self, Column, Entity};
use crate::store::Store;

/// Push subscription row (from the `push_subscriptions` table).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushSubscriptionRow {
    pub id: String,
    pub user_id: String,
    pub endpoint: String,
    pub p256dh_key: String,
    pub auth_key: String,
    pub created_at: DateTime<Utc>,
}

fn to_row(m: push_subscription::Model) -> PushSubscriptionRow {
    PushSubscriptionRow {
        id: m.id,
        user_id: m.user_id,
        endpoint: m.endpoint,
        p256dh_key: m.p256dh_key,
        auth_key: m.auth_key,
        created_at: m.created_at.with_timezone(&Utc),
    }
}

impl Store {
    /// Register a browser/device endpoint. Idempotent by endpoint: a
    /// re-subscribe from the same endpoint updates the keys and owner
    /// instead of failing on the unique constraint.
    pub async fn upsert_push_subscription(
        &self,
        user_id: &str,
        endpoint: &str,
        p256dh_key: &str,
        auth_key: &str,
    ) -> Result<PushSubscriptionRow> {
        let existing = Entity::find()
            .filter(Column::Endpoint.eq(endpoint))
            .one(self.db())
            .await?;
        let model = if let Some(m) = existing {
            let mut am: push_subscription::ActiveModel = m.into();
            am.user_id = Set(user_id.to_string());
            am.p256dh_key = Set(p256dh_key.to_string());
            am.auth_key = Set(auth_key.to_string());
            am.update(self.db()).await?
        } else {
            let am = push_subscription::ActiveModel {
                id: Set(vigia_common::id::next_id()),
                user_id: Set(user_id.to_string()),
                endpoint: Set(endpoint.to_string()),
                p256dh_key: Set(p256dh_key.to_string()),
                auth_key: Set(auth_key.to_string()),
                created_at: Set(Utc::now().fixed_offset()),
            };
            am.insert(self.db()).await?
        };
        Ok(to_row(model))
    }

    /// Atomic delete-by-endpoint (single DELETE statement — never
    /// read-then-delete, so a concurrently re-created subscription row for
    /// the same endpoint is not lost). Returns true when a row was removed.
    pub async fn delete_push_subscription_by_endpoint(&self, endpoint: &str) -> Result<bool> {
        let res = Entity::delete_many()
            .filter(Column::Endpoint.eq(endpoint))
            .exec(self.db())
            .await?;
        Ok(res.rows_affected > 0)
    }

    pub async fn list_push_subscriptions_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<PushSubscriptionRow>> {
        let rows = Entity::find()
            .filter(Column::UserId.eq(user_id))
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_row).collect())
    }

    pub async fn list_push_subscriptions_for_users(
        &self,
        user_ids: &[String],
    ) -> Result<Vec<PushSubscriptionRow>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = Entity::find()
            .filter(Column::UserId.is_in(user_ids.iter().cloned()))
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_row).collect())
    }
}
