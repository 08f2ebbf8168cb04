pub mod completion_rate;
pub mod ethics_approval;
pub mod inactivity;
pub mod missing_documentation;
pub mod recruitment_window;

use vigia_common::types::Severity;

/// Escalation policy for the day-based rules: `medium` past the threshold,
/// `high` at twice it, `critical` at four times.
pub(crate) fn day_overrun_severity(days: i64, threshold: i64) -> Severity {
    if days >= threshold * 4 {
        Severity::Critical
    } else if days >= threshold * 2 {
        Severity::High
    } else {
        Severity::Medium
    }
}
