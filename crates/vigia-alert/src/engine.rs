use crate::rules::completion_rate::CompletionRateCheck;
use crate::rules::ethics_approval::EthicsApprovalCheck;
use crate::rules::inactivity::InactivityCheck;
use crate::rules::missing_documentation::MissingDocumentationCheck;
use crate::rules::recruitment_window::RecruitmentWindowCheck;
use crate::{AlertCheck, CheckError};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use vigia_common::types::{
    AlertConfig, AlertKind, CandidateAlert, DedupKey, HospitalSnapshot, OpenAlert,
};

/// Read-only state one evaluation run operates on. Loaded once per run by
/// the caller; the engine itself performs no I/O.
pub struct EvalContext<'a> {
    pub now: DateTime<Utc>,
    pub hospitals: &'a [HospitalSnapshot],
    pub open_alerts: &'a [OpenAlert],
}

/// The result of evaluating one rule type across all hospitals.
#[derive(Debug, Default)]
pub struct RuleOutcome {
    /// The rule type was disabled in configuration and skipped entirely.
    pub disabled: bool,
    /// Candidates that passed deduplication and should be persisted.
    pub generated: Vec<CandidateAlert>,
    /// Candidates suppressed because the violation is already tracked by an
    /// unresolved alert (or duplicated within this run).
    pub skipped: Vec<CandidateAlert>,
    /// Open alerts whose condition has cleared; the caller resolves them.
    pub resolved: Vec<OpenAlert>,
    /// Configuration and per-hospital evaluation errors.
    pub errors: Vec<CheckError>,
}

impl RuleOutcome {
    fn config_error(error: CheckError) -> Self {
        Self {
            errors: vec![error],
            ..Default::default()
        }
    }

    fn disabled() -> Self {
        Self {
            disabled: true,
            ..Default::default()
        }
    }
}

pub struct CheckEngine {
    checks: Vec<Box<dyn AlertCheck>>,
}

impl CheckEngine {
    pub fn new(checks: Vec<Box<dyn AlertCheck>>) -> Self {
        Self { checks }
    }

    /// Engine with every built-in rule type registered.
    pub fn with_default_checks() -> Self {
        Self::new(vec![
            Box::new(EthicsApprovalCheck),
            Box::new(MissingDocumentationCheck),
            Box::new(RecruitmentWindowCheck),
            Box::new(InactivityCheck),
            Box::new(CompletionRateCheck),
        ])
    }

    pub fn get_check(&self, kind: AlertKind) -> Option<&dyn AlertCheck> {
        self.checks
            .iter()
            .find(|c| c.kind() == kind)
            .map(|c| c.as_ref())
    }

    pub fn kinds(&self) -> Vec<AlertKind> {
        self.checks.iter().map(|c| c.kind()).collect()
    }

    /// Evaluates one rule type against the context.
    ///
    /// Candidates whose dedup key matches an unresolved alert (or an earlier
    /// candidate in the same pass) are reported as skipped, never generated
    /// twice. Open alerts whose hospital evaluated clear are reported for
    /// resolution; hospitals that errored or are missing from the snapshot
    /// leave their alerts open — unknown state is not "clear".
    pub fn evaluate(
        &self,
        kind: AlertKind,
        config: &AlertConfig,
        ctx: &EvalContext<'_>,
    ) -> RuleOutcome {
        if !config.enabled {
            tracing::debug!(alert_type = kind.as_str(), "Rule disabled, skipping");
            return RuleOutcome::disabled();
        }

        let Some(check) = self.get_check(kind) else {
            return RuleOutcome::config_error(CheckError::UnknownKind(kind));
        };

        let threshold = match validate_threshold(kind, config.threshold_value) {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(alert_type = kind.as_str(), error = %e, "Rule misconfigured, skipping");
                return RuleOutcome::config_error(e);
            }
        };

        let open_keys: HashSet<&DedupKey> = ctx
            .open_alerts
            .iter()
            .filter(|o| o.key.kind == kind)
            .map(|o| &o.key)
            .collect();

        let mut outcome = RuleOutcome::default();
        let mut seen_this_run: HashSet<DedupKey> = HashSet::new();
        let mut clear_hospitals: HashSet<&str> = HashSet::new();

        for hospital in ctx.hospitals {
            match check.evaluate(hospital, threshold, ctx.now) {
                Ok(Some(candidate)) => {
                    let key = candidate.dedup_key();
                    if open_keys.contains(&key) || seen_this_run.contains(&key) {
                        outcome.skipped.push(candidate);
                    } else {
                        seen_this_run.insert(key);
                        outcome.generated.push(candidate);
                    }
                }
                Ok(None) => {
                    clear_hospitals.insert(hospital.hospital_id.as_str());
                }
                Err(e) => {
                    tracing::warn!(
                        alert_type = kind.as_str(),
                        hospital_id = %hospital.hospital_id,
                        error = %e,
                        "Hospital evaluation failed"
                    );
                    outcome.errors.push(e);
                }
            }
        }

        for open in ctx.open_alerts.iter().filter(|o| o.key.kind == kind) {
            let cleared = open
                .key
                .hospital_id
                .as_deref()
                .is_some_and(|hid| clear_hospitals.contains(hid));
            if cleared {
                outcome.resolved.push(open.clone());
            }
        }

        outcome
    }
}

fn validate_threshold(kind: AlertKind, value: Option<i64>) -> Result<i64, CheckError> {
    if !kind.requires_threshold() {
        return Ok(0);
    }
    match value {
        Some(t) if t > 0 => Ok(t),
        Some(t) => Err(CheckError::InvalidThreshold {
            kind,
            detail: format!("must be positive, got {t}"),
        }),
        None => Err(CheckError::InvalidThreshold {
            kind,
            detail: "missing threshold_value".to_string(),
        }),
    }
}
