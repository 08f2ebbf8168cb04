use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};

use crate::entities::communication::{self, Column, Entity};
use crate::store::Store;

/// Manually sent message row (from the `communications` table).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunicationRow {
    pub id: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub subject: String,
    pub body: String,
    pub hospital_id: Option<String>,
    pub project_id: Option<String>,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

fn to_row(m: communication::Model) -> CommunicationRow {
    CommunicationRow {
        id: m.id,
        sender_id: m.sender_id,
        recipient_id: m.recipient_id,
        subject: m.subject,
        body: m.body,
        hospital_id: m.hospital_id,
        project_id: m.project_id,
        read_at: m.read_at.map(|t| t.with_timezone(&Utc)),
        created_at: m.created_at.with_timezone(&Utc),
    }
}

impl Store {
    pub async fn insert_communication(
        &self,
        sender_id: &str,
        recipient_id: &str,
        subject: &str,
        body: &str,
        hospital_id: Option<&str>,
        project_id: Option<&str>,
    ) -> Result<CommunicationRow> {
        let am = communication::ActiveModel {
            id: Set(vigia_common::id::next_id()),
            sender_id: Set(sender_id.to_string()),
            recipient_id: Set(recipient_id.to_string()),
            subject: Set(subject.to_string()),
            body: Set(body.to_string()),
            hospital_id: Set(hospital_id.map(str::to_string)),
            project_id: Set(project_id.map(str::to_string)),
            read_at: Set(None),
            created_at: Set(Utc::now().fixed_offset()),
        };
        let model = am.insert(self.db()).await?;
        Ok(to_row(model))
    }

    pub async fn list_communications_for_user(
        &self,
        recipient_id: &str,
        unread_only: bool,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CommunicationRow>> {
        let mut q = Entity::find().filter(Column::RecipientId.eq(recipient_id));
        if unread_only {
            q = q.filter(Column::ReadAt.is_null());
        }
        let rows = q
            .order_by(Column::CreatedAt, Order::Desc)
            .limit(limit as u64)
            .offset(offset as u64)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_row).collect())
    }

    pub async fn count_communications_for_user(
        &self,
        recipient_id: &str,
        unread_only: bool,
    ) -> Result<u64> {
        let mut q = Entity::find().filter(Column::RecipientId.eq(recipient_id));
        if unread_only {
            q = q.filter(Column::ReadAt.is_null());
        }
        Ok(q.count(self.db()).await?)
    }

    /// Mark a communication read, scoped to the recipient.
    pub async fn mark_communication_read(
        &self,
        id: &str,
        recipient_id: &str,
        read_at: DateTime<Utc>,
    ) -> Result<bool> {
        let model = Entity::find_by_id(id)
            .filter(Column::RecipientId.eq(recipient_id))
            .one(self.db())
            .await?;
        let Some(m) = model else { return Ok(false) };
        if m.read_at.is_some() {
            return Ok(true);
        }
        let mut am: communication::ActiveModel = m.into();
        am.read_at = Set(Some(read_at.fixed_offset()));
        am.update(self.db()).await?;
        Ok(true)
    }
}
