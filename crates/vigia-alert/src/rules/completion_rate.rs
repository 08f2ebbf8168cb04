use crate::{AlertCheck, CheckError};
use chrono::{DateTime, Utc};
use vigia_common::types::{AlertKind, AlertPayload, CandidateAlert, HospitalSnapshot, Severity};

/// Enrollment completion percentage strictly below the configured percent.
/// A hospital exactly at the threshold is not flagged. Hospitals with no
/// enrollment target have no rate to compare and are never flagged.
pub struct CompletionRateCheck;

impl AlertCheck for CompletionRateCheck {
    fn kind(&self) -> AlertKind {
        AlertKind::LowCompletionRate
    }

    fn evaluate(
        &self,
        hospital: &HospitalSnapshot,
        threshold: i64,
        _now: DateTime<Utc>,
    ) -> Result<Option<CandidateAlert>, CheckError> {
        if hospital.target_patients <= 0 {
            return Ok(None);
        }
        if hospital.enrolled_patients < 0 {
            return Err(CheckError::MalformedEntity {
                hospital_id: hospital.hospital_id.clone(),
                detail: format!(
                    "negative enrolled_patients: {}",
                    hospital.enrolled_patients
                ),
            });
        }

        let percentage =
            hospital.enrolled_patients as f64 * 100.0 / hospital.target_patients as f64;
        if percentage >= threshold as f64 {
            return Ok(None);
        }

        let severity = if percentage < threshold as f64 / 2.0 {
            Severity::High
        } else {
            Severity::Medium
        };

        Ok(Some(CandidateAlert {
            kind: self.kind(),
            hospital_id: Some(hospital.hospital_id.clone()),
            project_id: hospital.project_id.clone(),
            severity,
            title: "Low completion rate".to_string(),
            message: format!(
                "{} has enrolled {} of {} patients ({:.1}%), below the {}% target",
                hospital.name,
                hospital.enrolled_patients,
                hospital.target_patients,
                percentage,
                threshold
            ),
            payload: AlertPayload::LowCompletion {
                percentage,
                threshold,
            },
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::hospital;

    fn with_enrollment(enrolled: i64, target: i64) -> HospitalSnapshot {
        let mut h = hospital("h-1");
        h.enrolled_patients = enrolled;
        h.target_patients = target;
        h
    }

    #[test]
    fn boundary_is_strictly_less_than() {
        let check = CompletionRateCheck;
        let now = Utc::now();

        // Exactly 65% with threshold 65: NOT flagged.
        let at_threshold = with_enrollment(65, 100);
        assert!(check.evaluate(&at_threshold, 65, now).unwrap().is_none());

        // 64% IS flagged.
        let below = with_enrollment(64, 100);
        let c = check.evaluate(&below, 65, now).unwrap().unwrap();
        assert_eq!(c.severity, Severity::Medium);
        match c.payload {
            AlertPayload::LowCompletion {
                percentage,
                threshold,
            } => {
                assert!((percentage - 64.0).abs() < f64::EPSILON);
                assert_eq!(threshold, 65);
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn far_below_threshold_is_high_severity() {
        let check = CompletionRateCheck;
        let c = check
            .evaluate(&with_enrollment(20, 100), 65, Utc::now())
            .unwrap()
            .unwrap();
        assert_eq!(c.severity, Severity::High);
    }

    #[test]
    fn zero_target_is_not_applicable() {
        let check = CompletionRateCheck;
        let h = with_enrollment(0, 0);
        assert!(check.evaluate(&h, 65, Utc::now()).unwrap().is_none());
    }

    #[test]
    fn negative_enrollment_is_an_entity_error() {
        let check = CompletionRateCheck;
        let h = with_enrollment(-3, 100);
        assert!(check.evaluate(&h, 65, Utc::now()).is_err());
    }
}
