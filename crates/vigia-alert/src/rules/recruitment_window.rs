use crate::{AlertCheck, CheckError};
use chrono::{DateTime, Utc};
use vigia_common::types::{AlertKind, AlertPayload, CandidateAlert, HospitalSnapshot, Severity};

/// A recruitment period starts within the configured number of days while
/// the hospital has not been activated yet.
pub struct RecruitmentWindowCheck;

impl AlertCheck for RecruitmentWindowCheck {
    fn kind(&self) -> AlertKind {
        AlertKind::UpcomingRecruitmentPeriod
    }

    fn evaluate(
        &self,
        hospital: &HospitalSnapshot,
        threshold: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<CandidateAlert>, CheckError> {
        if hospital.active {
            return Ok(None);
        }

        // Earliest period starting inside [now, now + threshold days].
        // Snapshots carry periods sorted by start.
        let mut upcoming = None;
        for period in &hospital.recruitment_periods {
            if period.ends_at < period.starts_at {
                return Err(CheckError::MalformedEntity {
                    hospital_id: hospital.hospital_id.clone(),
                    detail: format!("recruitment period {} ends before it starts", period.id),
                });
            }
            if period.starts_at < now {
                continue;
            }
            let starts_in_days = (period.starts_at - now).num_days();
            if starts_in_days <= threshold {
                upcoming = Some((period, starts_in_days));
                break;
            }
        }

        let Some((period, starts_in_days)) = upcoming else {
            return Ok(None);
        };

        // Closer starts are more urgent: inside a quarter of the window the
        // hospital is running out of time to activate.
        let severity = if starts_in_days <= (threshold / 4).max(1) {
            Severity::High
        } else {
            Severity::Medium
        };

        Ok(Some(CandidateAlert {
            kind: self.kind(),
            hospital_id: Some(hospital.hospital_id.clone()),
            project_id: hospital.project_id.clone(),
            severity,
            title: "Recruitment period approaching".to_string(),
            message: format!(
                "{} starts recruiting in {} day(s) but has not been activated",
                hospital.name, starts_in_days
            ),
            payload: AlertPayload::UpcomingRecruitment {
                period_id: period.id.clone(),
                starts_in_days,
            },
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{hospital, window};
    use chrono::Duration;

    #[test]
    fn inactive_hospital_with_near_period_fires() {
        let check = RecruitmentWindowCheck;
        let now = Utc::now();
        let mut h = hospital("h-1");
        h.recruitment_periods = vec![window("p-1", now + Duration::days(10), 30)];

        let c = check.evaluate(&h, 30, now).unwrap().unwrap();
        assert_eq!(c.severity, Severity::Medium);
        assert_eq!(
            c.payload,
            AlertPayload::UpcomingRecruitment {
                period_id: "p-1".into(),
                starts_in_days: 10,
            }
        );
    }

    #[test]
    fn active_hospital_is_clear() {
        let check = RecruitmentWindowCheck;
        let now = Utc::now();
        let mut h = hospital("h-1");
        h.active = true;
        h.recruitment_periods = vec![window("p-1", now + Duration::days(2), 30)];
        assert!(check.evaluate(&h, 30, now).unwrap().is_none());
    }

    #[test]
    fn far_periods_do_not_fire() {
        let check = RecruitmentWindowCheck;
        let now = Utc::now();
        let mut h = hospital("h-1");
        h.recruitment_periods = vec![window("p-1", now + Duration::days(45), 30)];
        assert!(check.evaluate(&h, 30, now).unwrap().is_none());
    }

    #[test]
    fn imminent_start_is_high_severity() {
        let check = RecruitmentWindowCheck;
        let now = Utc::now();
        let mut h = hospital("h-1");
        h.recruitment_periods = vec![window("p-1", now + Duration::days(5), 30)];
        let c = check.evaluate(&h, 30, now).unwrap().unwrap();
        assert_eq!(c.severity, Severity::High);
    }

    #[test]
    fn inverted_period_is_an_entity_error() {
        let check = RecruitmentWindowCheck;
        let now = Utc::now();
        let mut h = hospital("h-1");
        let mut w = window("p-1", now + Duration::days(5), 30);
        w.ends_at = w.starts_at - Duration::days(1);
        h.recruitment_periods = vec![w];
        assert!(check.evaluate(&h, 30, now).is_err());
    }
}
