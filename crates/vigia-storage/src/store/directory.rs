use anyhow::Result;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, QueryFilter};
use std::collections::HashMap;

use vigia_common::types::{HospitalSnapshot, RecruitmentWindow};

use crate::entities::{hospital, project, recruitment_period};
use crate::store::Store;

impl Store {
    /// Aggregate operational state of every hospital, with recruitment
    /// periods attached. This is the input the rule engine evaluates.
    pub async fn hospital_snapshots(&self) -> Result<Vec<HospitalSnapshot>> {
        let hospitals = hospital::Entity::find().all(self.db()).await?;
        let periods = recruitment_period::Entity::find().all(self.db()).await?;

        let mut by_hospital: HashMap<String, Vec<RecruitmentWindow>> = HashMap::new();
        for p in periods {
            by_hospital
                .entry(p.hospital_id.clone())
                .or_default()
                .push(RecruitmentWindow {
                    id: p.id,
                    starts_at: p.starts_at.with_timezone(&Utc),
                    ends_at: p.ends_at.with_timezone(&Utc),
                });
        }

        let mut snapshots = Vec::with_capacity(hospitals.len());
        for h in hospitals {
            let missing_documents: Vec<String> =
                serde_json::from_str(&h.missing_documents).unwrap_or_else(|e| {
                    tracing::warn!(hospital_id = %h.id, error = %e, "Malformed missing_documents column");
                    Vec::new()
                });
            let mut recruitment = by_hospital.remove(&h.id).unwrap_or_default();
            recruitment.sort_by_key(|w| w.starts_at);
            snapshots.push(HospitalSnapshot {
                hospital_id: h.id,
                project_id: h.project_id,
                name: h.name,
                active: h.active,
                ethics_submitted_at: h.ethics_submitted_at.map(|t| t.with_timezone(&Utc)),
                ethics_approved_at: h.ethics_approved_at.map(|t| t.with_timezone(&Utc)),
                missing_documents,
                target_patients: h.target_patients,
                enrolled_patients: h.enrolled_patients,
                last_activity_at: h.last_activity_at.map(|t| t.with_timezone(&Utc)),
                created_at: h.created_at.with_timezone(&Utc),
                recruitment_periods: recruitment,
            });
        }
        Ok(snapshots)
    }

    pub async fn get_hospital_name(&self, id: &str) -> Result<Option<String>> {
        let model = hospital::Entity::find_by_id(id).one(self.db()).await?;
        Ok(model.map(|m| m.name))
    }

    pub async fn get_project_name(&self, id: &str) -> Result<Option<String>> {
        let model = project::Entity::find_by_id(id).one(self.db()).await?;
        Ok(model.map(|m| m.name))
    }

    /// Hospital IDs belonging to a project (for coordinator resolution).
    pub async fn hospital_ids_of_project(&self, project_id: &str) -> Result<Vec<String>> {
        let rows = hospital::Entity::find()
            .filter(hospital::Column::ProjectId.eq(project_id))
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(|m| m.id).collect())
    }

    /// Test/seed helper: insert a hospital row from a snapshot.
    pub async fn insert_hospital(&self, snapshot: &HospitalSnapshot) -> Result<()> {
        let now = Utc::now().fixed_offset();
        let am = hospital::ActiveModel {
            id: Set(snapshot.hospital_id.clone()),
            project_id: Set(snapshot.project_id.clone()),
            name: Set(snapshot.name.clone()),
            active: Set(snapshot.active),
            ethics_submitted_at: Set(snapshot.ethics_submitted_at.map(|t| t.fixed_offset())),
            ethics_approved_at: Set(snapshot.ethics_approved_at.map(|t| t.fixed_offset())),
            missing_documents: Set(serde_json::to_string(&snapshot.missing_documents)?),
            target_patients: Set(snapshot.target_patients),
            enrolled_patients: Set(snapshot.enrolled_patients),
            last_activity_at: Set(snapshot.last_activity_at.map(|t| t.fixed_offset())),
            created_at: Set(snapshot.created_at.fixed_offset()),
            updated_at: Set(now),
        };
        am.insert(self.db()).await?;
        for w in &snapshot.recruitment_periods {
            let am = recruitment_period::ActiveModel {
                id: Set(w.id.clone()),
                hospital_id: Set(snapshot.hospital_id.clone()),
                starts_at: Set(w.starts_at.fixed_offset()),
                ends_at: Set(w.ends_at.fixed_offset()),
                created_at: Set(now),
            };
            am.insert(self.db()).await?;
        }
        Ok(())
    }

    /// Clears an ethics-pending condition (admin action; also used by tests).
    pub async fn approve_hospital_ethics(
        &self,
        hospital_id: &str,
        approved_at: chrono::DateTime<Utc>,
    ) -> Result<bool> {
        let model = hospital::Entity::find_by_id(hospital_id)
            .one(self.db())
            .await?;
        let Some(m) = model else { return Ok(false) };
        let mut am: hospital::ActiveModel = m.into();
        am.ethics_approved_at = Set(Some(approved_at.fixed_offset()));
        am.updated_at = Set(Utc::now().fixed_offset());
        am.update(self.db()).await?;
        Ok(true)
    }
}
