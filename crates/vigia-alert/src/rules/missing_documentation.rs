use crate::{AlertCheck, CheckError};
use chrono::{DateTime, Utc};
use vigia_common::types::{AlertKind, AlertPayload, CandidateAlert, HospitalSnapshot, Severity};

/// Required hospital documentation is still outstanding. Boolean check, no
/// threshold.
pub struct MissingDocumentationCheck;

impl AlertCheck for MissingDocumentationCheck {
    fn kind(&self) -> AlertKind {
        AlertKind::MissingDocumentation
    }

    fn evaluate(
        &self,
        hospital: &HospitalSnapshot,
        _threshold: i64,
        _now: DateTime<Utc>,
    ) -> Result<Option<CandidateAlert>, CheckError> {
        if hospital.missing_documents.is_empty() {
            return Ok(None);
        }

        let documents = hospital.missing_documents.clone();
        let severity = if documents.len() >= 3 {
            Severity::High
        } else {
            Severity::Medium
        };

        Ok(Some(CandidateAlert {
            kind: self.kind(),
            hospital_id: Some(hospital.hospital_id.clone()),
            project_id: hospital.project_id.clone(),
            severity,
            title: "Missing documentation".to_string(),
            message: format!(
                "{} is missing {} required document(s): {}",
                hospital.name,
                documents.len(),
                documents.join(", ")
            ),
            payload: AlertPayload::MissingDocumentation { documents },
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::hospital;

    #[test]
    fn complete_documentation_is_clear() {
        let check = MissingDocumentationCheck;
        let h = hospital("h-1");
        assert!(check.evaluate(&h, 0, Utc::now()).unwrap().is_none());
    }

    #[test]
    fn severity_rises_with_three_missing_documents() {
        let check = MissingDocumentationCheck;
        let mut h = hospital("h-1");
        h.missing_documents = vec!["delegation log".into(), "CV PI".into()];
        let c = check.evaluate(&h, 0, Utc::now()).unwrap().unwrap();
        assert_eq!(c.severity, Severity::Medium);

        h.missing_documents.push("insurance certificate".into());
        let c = check.evaluate(&h, 0, Utc::now()).unwrap().unwrap();
        assert_eq!(c.severity, Severity::High);
        assert!(c.message.contains("insurance certificate"));
    }
}
