//! Alert rule engine for evaluating hospital-study state against
//! configurable thresholds.
//!
//! Each rule type implements [`AlertCheck`] as a pure predicate over one
//! hospital snapshot. The [`engine::CheckEngine`] runs a rule across every
//! snapshot, deduplicates candidates against the already-open alerts, and
//! reports which open alerts have cleared. All I/O (loading snapshots,
//! persisting alerts, dispatching notifications) lives in the caller.

pub mod engine;
pub mod rules;

#[cfg(test)]
mod tests;

use chrono::{DateTime, Utc};
use vigia_common::types::{AlertKind, CandidateAlert, HospitalSnapshot};

/// A violation-detection predicate for one [`AlertKind`].
///
/// Implementations are registered in the [`engine::CheckEngine`] and
/// evaluated once per hospital snapshot per run. The engine handles
/// deduplication and resolve-on-clear; a check only answers the question
/// "does this hospital violate my condition right now".
pub trait AlertCheck: Send + Sync {
    /// The rule type this check implements.
    fn kind(&self) -> AlertKind;

    /// Evaluates one hospital.
    ///
    /// - `Ok(Some(_))` — the condition is violated; the candidate is not yet
    ///   checked for duplication.
    /// - `Ok(None)` — the condition is clear for this hospital (an open
    ///   alert of this kind for it will be resolved).
    /// - `Err(_)` — this hospital's data is malformed; the error is
    ///   collected and evaluation of the remaining hospitals continues.
    ///
    /// `threshold` is validated by the engine before the per-hospital loop:
    /// kinds that require one receive a positive value, kinds that do not
    /// receive `0`.
    fn evaluate(
        &self,
        hospital: &HospitalSnapshot,
        threshold: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<CandidateAlert>, CheckError>;
}

/// Errors produced during rule evaluation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CheckError {
    /// The rule's configured threshold is missing or unusable. The whole
    /// rule type is skipped for the run.
    #[error("invalid threshold for {kind}: {detail}")]
    InvalidThreshold { kind: AlertKind, detail: String },

    /// One hospital's data is malformed. Only that hospital is skipped.
    #[error("malformed state for hospital {hospital_id}: {detail}")]
    MalformedEntity {
        hospital_id: String,
        detail: String,
    },

    /// No check is registered for the requested kind.
    #[error("no check registered for alert kind {0}")]
    UnknownKind(AlertKind),
}

impl CheckError {
    /// True for errors that invalidate the whole rule type rather than a
    /// single hospital.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            CheckError::InvalidThreshold { .. } | CheckError::UnknownKind(_)
        )
    }
}
