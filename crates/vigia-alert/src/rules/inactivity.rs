use crate::rules::day_overrun_severity;
use crate::{AlertCheck, CheckError};
use chrono::{DateTime, Utc};
use vigia_common::types::{AlertKind, AlertPayload, CandidateAlert, HospitalSnapshot};

/// No recorded activity for a hospital in the configured number of days.
/// Hospitals with no activity at all are measured from their creation date.
pub struct InactivityCheck;

impl AlertCheck for InactivityCheck {
    fn kind(&self) -> AlertKind {
        AlertKind::NoActivity30Days
    }

    fn evaluate(
        &self,
        hospital: &HospitalSnapshot,
        threshold: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<CandidateAlert>, CheckError> {
        let last = hospital.last_activity_at.unwrap_or(hospital.created_at);
        if last > now {
            return Err(CheckError::MalformedEntity {
                hospital_id: hospital.hospital_id.clone(),
                detail: format!("last activity {last} is in the future"),
            });
        }

        let days_inactive = (now - last).num_days();
        if days_inactive < threshold {
            return Ok(None);
        }

        Ok(Some(CandidateAlert {
            kind: self.kind(),
            hospital_id: Some(hospital.hospital_id.clone()),
            project_id: hospital.project_id.clone(),
            severity: day_overrun_severity(days_inactive, threshold),
            title: "No recent activity".to_string(),
            message: format!(
                "{} has recorded no activity for {} day(s)",
                hospital.name, days_inactive
            ),
            payload: AlertPayload::Inactivity { days_inactive },
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::hospital;
    use chrono::Duration;
    use vigia_common::types::Severity;

    #[test]
    fn recent_activity_is_clear() {
        let check = InactivityCheck;
        let now = Utc::now();
        let mut h = hospital("h-1");
        h.last_activity_at = Some(now - Duration::days(5));
        assert!(check.evaluate(&h, 30, now).unwrap().is_none());
    }

    #[test]
    fn stale_hospital_fires_with_escalation() {
        let check = InactivityCheck;
        let now = Utc::now();
        let mut h = hospital("h-1");
        h.last_activity_at = Some(now - Duration::days(65));
        let c = check.evaluate(&h, 30, now).unwrap().unwrap();
        assert_eq!(c.severity, Severity::High);
        assert_eq!(c.payload, AlertPayload::Inactivity { days_inactive: 65 });
    }

    #[test]
    fn falls_back_to_creation_date() {
        let check = InactivityCheck;
        let now = Utc::now();
        let mut h = hospital("h-1");
        h.created_at = now - Duration::days(40);
        h.last_activity_at = None;
        let c = check.evaluate(&h, 30, now).unwrap().unwrap();
        assert_eq!(c.payload, AlertPayload::Inactivity { days_inactive: 40 });
    }
}
