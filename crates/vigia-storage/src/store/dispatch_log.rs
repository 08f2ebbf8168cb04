use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, EntityTrait, Order, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};

use crate::entities::dispatch_log::{self, Column, Entity};
use crate::store::Store;

/// One per-(recipient, channel) delivery outcome (audit trail row).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchLogRow {
    pub id: String,
    pub alert_id: Option<String>,
    pub communication_batch_id: Option<String>,
    pub channel: String,
    pub user_id: String,
    pub status: String,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Dispatch log listing filter.
#[derive(Debug, Clone, Default)]
pub struct DispatchLogFilter {
    pub alert_id_eq: Option<String>,
    pub communication_batch_id_eq: Option<String>,
    pub channel_eq: Option<String>,
    pub status_eq: Option<String>,
    pub user_id_eq: Option<String>,
}

fn to_row(m: dispatch_log::Model) -> DispatchLogRow {
    DispatchLogRow {
        id: m.id,
        alert_id: m.alert_id,
        communication_batch_id: m.communication_batch_id,
        channel: m.channel,
        user_id: m.user_id,
        status: m.status,
        reason: m.reason,
        created_at: m.created_at.with_timezone(&Utc),
    }
}

fn apply_filter(
    mut q: sea_orm::Select<Entity>,
    filter: &DispatchLogFilter,
) -> sea_orm::Select<Entity> {
    if let Some(aid) = &filter.alert_id_eq {
        q = q.filter(Column::AlertId.eq(aid.clone()));
    }
    if let Some(bid) = &filter.communication_batch_id_eq {
        q = q.filter(Column::CommunicationBatchId.eq(bid.clone()));
    }
    if let Some(ch) = &filter.channel_eq {
        q = q.filter(Column::Channel.eq(ch.clone()));
    }
    if let Some(st) = &filter.status_eq {
        q = q.filter(Column::Status.eq(st.clone()));
    }
    if let Some(uid) = &filter.user_id_eq {
        q = q.filter(Column::UserId.eq(uid.clone()));
    }
    q
}

impl Store {
    /// Batch-insert the outcomes of one dispatch.
    pub async fn insert_dispatch_logs(&self, rows: &[DispatchLogRow]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let now = Utc::now().fixed_offset();
        let models: Vec<dispatch_log::ActiveModel> = rows
            .iter()
            .map(|r| dispatch_log::ActiveModel {
                id: sea_orm::ActiveValue::Set(vigia_common::id::next_id()),
                alert_id: sea_orm::ActiveValue::Set(r.alert_id.clone()),
                communication_batch_id: sea_orm::ActiveValue::Set(
                    r.communication_batch_id.clone(),
                ),
                channel: sea_orm::ActiveValue::Set(r.channel.clone()),
                user_id: sea_orm::ActiveValue::Set(r.user_id.clone()),
                status: sea_orm::ActiveValue::Set(r.status.clone()),
                reason: sea_orm::ActiveValue::Set(r.reason.clone()),
                created_at: sea_orm::ActiveValue::Set(now),
            })
            .collect();
        Entity::insert_many(models).exec(self.db()).await?;
        Ok(())
    }

    pub async fn list_dispatch_logs(
        &self,
        filter: &DispatchLogFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<DispatchLogRow>> {
        let rows = apply_filter(Entity::find(), filter)
            .order_by(Column::CreatedAt, Order::Desc)
            .limit(limit as u64)
            .offset(offset as u64)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_row).collect())
    }

    pub async fn count_dispatch_logs(&self, filter: &DispatchLogFilter) -> Result<u64> {
        Ok(apply_filter(Entity::find(), filter)
            .count(self.db())
            .await?)
    }
}
