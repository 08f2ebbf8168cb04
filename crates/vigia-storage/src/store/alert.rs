use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect,
};

use vigia_common::types::{
    AlertKind, AlertPayload, AlertRecord, CandidateAlert, DedupKey, OpenAlert, Severity,
};

use crate::entities::alert::{self, Column, Entity};
use crate::store::{is_unique_violation, Store};

/// Alert listing filter.
#[derive(Debug, Clone, Default)]
pub struct AlertListFilter {
    pub alert_type_eq: Option<AlertKind>,
    pub severity_eq: Option<Severity>,
    pub is_resolved_eq: Option<bool>,
    pub hospital_id_eq: Option<String>,
    pub project_id_eq: Option<String>,
}

fn to_record(m: alert::Model) -> Result<AlertRecord> {
    let kind: AlertKind = m
        .alert_type
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;
    let severity: Severity = m
        .severity
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;
    let payload: AlertPayload = serde_json::from_str(&m.payload_json)?;
    Ok(AlertRecord {
        id: m.id,
        kind,
        title: m.title,
        message: m.message,
        severity,
        hospital_id: m.hospital_id,
        project_id: m.project_id,
        payload,
        is_resolved: m.is_resolved,
        created_at: m.created_at.with_timezone(&Utc),
        resolved_at: m.resolved_at.map(|t| t.with_timezone(&Utc)),
    })
}

fn apply_filter(
    mut q: sea_orm::Select<Entity>,
    filter: &AlertListFilter,
) -> sea_orm::Select<Entity> {
    if let Some(kind) = filter.alert_type_eq {
        q = q.filter(Column::AlertType.eq(kind.as_str()));
    }
    if let Some(sev) = filter.severity_eq {
        q = q.filter(Column::Severity.eq(sev.to_string()));
    }
    if let Some(resolved) = filter.is_resolved_eq {
        q = q.filter(Column::IsResolved.eq(resolved));
    }
    if let Some(hid) = &filter.hospital_id_eq {
        q = q.filter(Column::HospitalId.eq(hid.clone()));
    }
    if let Some(pid) = &filter.project_id_eq {
        q = q.filter(Column::ProjectId.eq(pid.clone()));
    }
    q
}

impl Store {
    /// Persist a candidate that passed deduplication.
    ///
    /// Returns `Ok(None)` when the insert loses a race against a concurrent
    /// run: the partial unique index rejects a second unresolved alert for
    /// the same dedup key, and the caller counts the candidate as skipped.
    pub async fn insert_alert(&self, candidate: &CandidateAlert) -> Result<Option<AlertRecord>> {
        let now = Utc::now().fixed_offset();
        let am = alert::ActiveModel {
            id: Set(vigia_common::id::next_id()),
            alert_type: Set(candidate.kind.as_str().to_string()),
            title: Set(candidate.title.clone()),
            message: Set(candidate.message.clone()),
            severity: Set(candidate.severity.to_string()),
            hospital_id: Set(candidate.hospital_id.clone()),
            project_id: Set(candidate.project_id.clone()),
            payload_json: Set(serde_json::to_string(&candidate.payload)?),
            is_resolved: Set(false),
            created_at: Set(now),
            resolved_at: Set(None),
        };
        match am.insert(self.db()).await {
            Ok(model) => Ok(Some(to_record(model)?)),
            Err(e) if is_unique_violation(&e) => {
                tracing::debug!(
                    alert_type = candidate.kind.as_str(),
                    hospital_id = candidate.hospital_id.as_deref().unwrap_or("-"),
                    "Concurrent unresolved alert already exists, skipping insert"
                );
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_alert(&self, id: &str) -> Result<Option<AlertRecord>> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        model.map(to_record).transpose()
    }

    /// Dedup keys of every unresolved alert, for the deduplicator.
    pub async fn list_open_alerts(&self) -> Result<Vec<OpenAlert>> {
        let rows = Entity::find()
            .filter(Column::IsResolved.eq(false))
            .all(self.db())
            .await?;
        let mut open = Vec::with_capacity(rows.len());
        for m in rows {
            let kind: AlertKind = m
                .alert_type
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))?;
            open.push(OpenAlert {
                id: m.id,
                key: DedupKey {
                    kind,
                    hospital_id: m.hospital_id,
                    project_id: m.project_id,
                },
            });
        }
        Ok(open)
    }

    /// Mark an alert resolved. Returns the updated record, or `None` when the
    /// alert does not exist or is already resolved.
    pub async fn resolve_alert(
        &self,
        id: &str,
        resolved_at: DateTime<Utc>,
    ) -> Result<Option<AlertRecord>> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        let Some(m) = model else { return Ok(None) };
        if m.is_resolved {
            return Ok(None);
        }
        let mut am: alert::ActiveModel = m.into();
        am.is_resolved = Set(true);
        am.resolved_at = Set(Some(resolved_at.fixed_offset()));
        let updated = am.update(self.db()).await?;
        Ok(Some(to_record(updated)?))
    }

    pub async fn list_alerts(
        &self,
        filter: &AlertListFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<AlertRecord>> {
        let rows = apply_filter(Entity::find(), filter)
            .order_by(Column::CreatedAt, Order::Desc)
            .limit(limit as u64)
            .offset(offset as u64)
            .all(self.db())
            .await?;
        rows.into_iter().map(to_record).collect()
    }

    pub async fn count_alerts(&self, filter: &AlertListFilter) -> Result<u64> {
        Ok(apply_filter(Entity::find(), filter)
            .count(self.db())
            .await?)
    }
}
