use crate::rules::day_overrun_severity;
use crate::{AlertCheck, CheckError};
use chrono::{DateTime, Utc};
use vigia_common::types::{AlertKind, AlertPayload, CandidateAlert, HospitalSnapshot};

/// Ethics dossier submitted but not approved for at least the configured
/// number of days.
pub struct EthicsApprovalCheck;

impl AlertCheck for EthicsApprovalCheck {
    fn kind(&self) -> AlertKind {
        AlertKind::EthicsApprovalPending
    }

    fn evaluate(
        &self,
        hospital: &HospitalSnapshot,
        threshold: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<CandidateAlert>, CheckError> {
        let Some(submitted) = hospital.ethics_submitted_at else {
            return Ok(None);
        };
        if hospital.ethics_approved_at.is_some() {
            return Ok(None);
        }
        if submitted > now {
            return Err(CheckError::MalformedEntity {
                hospital_id: hospital.hospital_id.clone(),
                detail: format!("ethics_submitted_at {submitted} is in the future"),
            });
        }

        let days_pending = (now - submitted).num_days();
        if days_pending < threshold {
            return Ok(None);
        }

        Ok(Some(CandidateAlert {
            kind: self.kind(),
            hospital_id: Some(hospital.hospital_id.clone()),
            project_id: hospital.project_id.clone(),
            severity: day_overrun_severity(days_pending, threshold),
            title: "Ethics approval pending".to_string(),
            message: format!(
                "{} submitted its ethics dossier {} days ago and approval is still outstanding",
                hospital.name, days_pending
            ),
            payload: AlertPayload::EthicsPending { days_pending },
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
    fn fires_only_at_or_past_threshold() {
        let check = EthicsApprovalCheck;
        let now = Utc::now();
        let mut h = hospital("h-1");
        h.ethics_submitted_at = Some(now - Duration::days(13));
        assert!(check.evaluate(&h, 14, now).unwrap().is_none());

        h.ethics_submitted_at = Some(now - Duration::days(14));
        let candidate = check.evaluate(&h, 14, now).unwrap().unwrap();
        assert_eq!(candidate.severity, Severity::Medium);
        assert_eq!(
            candidate.payload,
            AlertPayload::EthicsPending { days_pending: 14 }
        );
    }

    #[test]
    fn approval_clears_the_condition() {
        let check = EthicsApprovalCheck;
        let now = Utc::now();
        let mut h = hospital("h-1");
        h.ethics_submitted_at = Some(now - Duration::days(60));
        h.ethics_approved_at = Some(now - Duration::days(1));
        assert!(check.evaluate(&h, 14, now).unwrap().is_none());
    }

    #[test]
    fn severity_escalates_with_overrun() {
        let check = EthicsApprovalCheck;
        let now = Utc::now();
        let mut h = hospital("h-1");

        h.ethics_submitted_at = Some(now - Duration::days(28));
        let c = check.evaluate(&h, 14, now).unwrap().unwrap();
        assert_eq!(c.severity, Severity::High);

        h.ethics_submitted_at = Some(now - Duration::days(56));
        let c = check.evaluate(&h, 14, now).unwrap().unwrap();
        assert_eq!(c.severity, Severity::Critical);
    }

    #[test]
    fn future_submission_is_an_entity_error() {
        let check = EthicsApprovalCheck;
        let now = Utc::now();
        let mut h = hospital("h-1");
        h.ethics_submitted_at = Some(now + Duration::days(2));
        let err = check.evaluate(&h, 14, now).unwrap_err();
        assert!(matches!(err, CheckError::MalformedEntity { .. }));
    }
}
