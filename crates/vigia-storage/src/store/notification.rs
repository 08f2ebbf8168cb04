use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};

use vigia_common::types::NotificationKind;

use crate::entities::notification::{self, Column, Entity};
use crate::store::Store;

/// In-app feed row (from the `notifications` table).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRow {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub message: String,
    pub kind: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

fn to_row(m: notification::Model) -> NotificationRow {
    NotificationRow {
        id: m.id,
        user_id: m.user_id,
        title: m.title,
        message: m.message,
        kind: m.kind,
        is_read: m.is_read,
        created_at: m.created_at.with_timezone(&Utc),
    }
}

impl Store {
    pub async fn insert_notification(
        &self,
        user_id: &str,
        title: &str,
        message: &str,
        kind: NotificationKind,
    ) -> Result<NotificationRow> {
        let now = Utc::now().fixed_offset();
        let am = notification::ActiveModel {
            id: Set(vigia_common::id::next_id()),
            user_id: Set(user_id.to_string()),
            title: Set(title.to_string()),
            message: Set(message.to_string()),
            kind: Set(kind.to_string()),
            is_read: Set(false),
            created_at: Set(now),
        };
        let model = am.insert(self.db()).await?;
        Ok(to_row(model))
    }

    pub async fn list_notifications_for_user(
        &self,
        user_id: &str,
        is_read: Option<bool>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<NotificationRow>> {
        let mut q = Entity::find().filter(Column::UserId.eq(user_id));
        if let Some(read) = is_read {
            q = q.filter(Column::IsRead.eq(read));
        }
        let rows = q
            .order_by(Column::CreatedAt, Order::Desc)
            .limit(limit as u64)
            .offset(offset as u64)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_row).collect())
    }

    pub async fn count_notifications_for_user(
        &self,
        user_id: &str,
        is_read: Option<bool>,
    ) -> Result<u64> {
        let mut q = Entity::find().filter(Column::UserId.eq(user_id));
        if let Some(read) = is_read {
            q = q.filter(Column::IsRead.eq(read));
        }
        Ok(q.count(self.db()).await?)
    }

    /// Mark one notification read. Scoped to the owning user so one user
    /// cannot acknowledge another's feed.
    pub async fn mark_notification_read(&self, id: &str, user_id: &str) -> Result<bool> {
        let model = Entity::find_by_id(id)
            .filter(Column::UserId.eq(user_id))
            .one(self.db())
            .await?;
        let Some(m) = model else { return Ok(false) };
        if m.is_read {
            return Ok(true);
        }
        let mut am: notification::ActiveModel = m.into();
        am.is_read = Set(true);
        am.update(self.db()).await?;
        Ok(true)
    }

    pub async fn mark_all_notifications_read(&self, user_id: &str) -> Result<u64> {
        let res = Entity::update_many()
            .col_expr(Column::IsRead, sea_orm::sea_query::Expr::value(true))
            .filter(Column::UserId.eq(user_id))
            .filter(Column::IsRead.eq(false))
            .exec(self.db())
            .await?;
        Ok(res.rows_affected)
    }
}
