use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Alert severity level, ordered from lowest to highest.
///
/// # Examples
///
/// ```
/// use vigia_common::types::Severity;
///
/// let sev: Severity = "high".parse().unwrap();
/// assert_eq!(sev, Severity::High);
/// assert_eq!(sev.to_string(), "high");
/// assert!(Severity::Critical > Severity::Low);
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, utoipa::ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            _ => Err(format!("unknown severity: {s}")),
        }
    }
}

/// One named violation-detection predicate with its own threshold and
/// notification policy.
///
/// # Examples
///
/// ```
/// use vigia_common::types::AlertKind;
///
/// let kind: AlertKind = "low_completion_rate".parse().unwrap();
/// assert_eq!(kind, AlertKind::LowCompletionRate);
/// assert_eq!(kind.as_str(), "low_completion_rate");
/// assert!(kind.requires_threshold());
/// assert!(!AlertKind::MissingDocumentation.requires_threshold());
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema,
)]
pub enum AlertKind {
    #[serde(rename = "ethics_approval_pending")]
    EthicsApprovalPending,
    #[serde(rename = "missing_documentation")]
    MissingDocumentation,
    #[serde(rename = "upcoming_recruitment_period")]
    UpcomingRecruitmentPeriod,
    #[serde(rename = "no_activity_30_days")]
    NoActivity30Days,
    #[serde(rename = "low_completion_rate")]
    LowCompletionRate,
}

impl AlertKind {
    /// Every kind, in the order the scheduler evaluates them.
    pub const ALL: [AlertKind; 5] = [
        AlertKind::EthicsApprovalPending,
        AlertKind::MissingDocumentation,
        AlertKind::UpcomingRecruitmentPeriod,
        AlertKind::NoActivity30Days,
        AlertKind::LowCompletionRate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::EthicsApprovalPending => "ethics_approval_pending",
            AlertKind::MissingDocumentation => "missing_documentation",
            AlertKind::UpcomingRecruitmentPeriod => "upcoming_recruitment_period",
            AlertKind::NoActivity30Days => "no_activity_30_days",
            AlertKind::LowCompletionRate => "low_completion_rate",
        }
    }

    /// Whether `threshold_value` is mandatory for this kind.
    pub fn requires_threshold(&self) -> bool {
        !matches!(self, AlertKind::MissingDocumentation)
    }
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AlertKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ethics_approval_pending" => Ok(AlertKind::EthicsApprovalPending),
            "missing_documentation" => Ok(AlertKind::MissingDocumentation),
            "upcoming_recruitment_period" => Ok(AlertKind::UpcomingRecruitmentPeriod),
            "no_activity_30_days" => Ok(AlertKind::NoActivity30Days),
            "low_completion_rate" => Ok(AlertKind::LowCompletionRate),
            _ => Err(format!("unknown alert kind: {s}")),
        }
    }
}

/// In-app feed entry kind.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Info,
    Success,
    Warning,
    Error,
}

impl NotificationKind {
    /// Deterministic mapping used when an alert fans out to the in-app feed.
    pub fn from_severity(severity: Severity) -> Self {
        match severity {
            Severity::Low => NotificationKind::Info,
            Severity::Medium | Severity::High => NotificationKind::Warning,
            Severity::Critical => NotificationKind::Error,
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationKind::Info => write!(f, "info"),
            NotificationKind::Success => write!(f, "success"),
            NotificationKind::Warning => write!(f, "warning"),
            NotificationKind::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for NotificationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(NotificationKind::Info),
            "success" => Ok(NotificationKind::Success),
            "warning" => Ok(NotificationKind::Warning),
            "error" => Ok(NotificationKind::Error),
            _ => Err(format!("unknown notification kind: {s}")),
        }
    }
}

/// One delivery mechanism.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema,
)]
pub enum Channel {
    #[serde(rename = "in_app")]
    InApp,
    #[serde(rename = "email")]
    Email,
    #[serde(rename = "push")]
    Push,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::InApp => "in_app",
            Channel::Email => "email",
            Channel::Push => "push",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_app" => Ok(Channel::InApp),
            "email" => Ok(Channel::Email),
            "push" => Ok(Channel::Push),
            _ => Err(format!("unknown channel: {s}")),
        }
    }
}

/// Rule-specific alert payload, one closed shape per [`AlertKind`].
///
/// Stored as `payload_json` on the alert row and flattened into template
/// variables when the alert is rendered for delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlertPayload {
    EthicsPending {
        days_pending: i64,
    },
    MissingDocumentation {
        documents: Vec<String>,
    },
    UpcomingRecruitment {
        period_id: String,
        starts_in_days: i64,
    },
    Inactivity {
        days_inactive: i64,
    },
    LowCompletion {
        percentage: f64,
        threshold: i64,
    },
}

impl AlertPayload {
    /// Flatten the payload into `(name, value)` template variables.
    pub fn template_vars(&self) -> Vec<(&'static str, String)> {
        match self {
            AlertPayload::EthicsPending { days_pending } => {
                vec![("days_pending", days_pending.to_string())]
            }
            AlertPayload::MissingDocumentation { documents } => vec![
                ("missing_count", documents.len().to_string()),
                ("missing_documents", documents.join(", ")),
            ],
            AlertPayload::UpcomingRecruitment {
                period_id,
                starts_in_days,
            } => vec![
                ("period_id", period_id.clone()),
                ("starts_in_days", starts_in_days.to_string()),
            ],
            AlertPayload::Inactivity { days_inactive } => {
                vec![("days_inactive", days_inactive.to_string())]
            }
            AlertPayload::LowCompletion {
                percentage,
                threshold,
            } => vec![
                ("percentage", format!("{percentage:.1}")),
                ("threshold", threshold.to_string()),
            ],
        }
    }
}

/// The `(type, hospital, project)` tuple identifying an already-tracked
/// unresolved violation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub kind: AlertKind,
    pub hospital_id: Option<String>,
    pub project_id: Option<String>,
}

/// An unresolved alert as seen by the deduplicator: its row ID plus dedup key.
#[derive(Debug, Clone)]
pub struct OpenAlert {
    pub id: String,
    pub key: DedupKey,
}

/// A violation detected during rule evaluation, not yet checked for
/// duplication.
#[derive(Debug, Clone)]
pub struct CandidateAlert {
    pub kind: AlertKind,
    pub hospital_id: Option<String>,
    pub project_id: Option<String>,
    pub severity: Severity,
    pub title: String,
    pub message: String,
    pub payload: AlertPayload,
}

impl CandidateAlert {
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey {
            kind: self.kind,
            hospital_id: self.hospital_id.clone(),
            project_id: self.project_id.clone(),
        }
    }
}

/// A persisted alert.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct AlertRecord {
    pub id: String,
    pub kind: AlertKind,
    pub title: String,
    pub message: String,
    pub severity: Severity,
    pub hospital_id: Option<String>,
    pub project_id: Option<String>,
    pub payload: AlertPayload,
    pub is_resolved: bool,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Per-type alert configuration, read on every rule evaluation.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct AlertConfig {
    pub alert_type: AlertKind,
    pub enabled: bool,
    pub notify_admin: bool,
    pub notify_coordinator: bool,
    pub auto_send_email: bool,
    /// Meaning depends on the kind: days for the day-based rules, percent
    /// for `low_completion_rate`, unused for `missing_documentation`.
    pub threshold_value: Option<i64>,
    pub email_template_id: Option<String>,
}

/// A recruitment window attached to a hospital snapshot.
#[derive(Debug, Clone)]
pub struct RecruitmentWindow {
    pub id: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

/// Aggregate operational state of one hospital, as evaluated by the rules.
#[derive(Debug, Clone)]
pub struct HospitalSnapshot {
    pub hospital_id: String,
    pub project_id: Option<String>,
    pub name: String,
    pub active: bool,
    pub ethics_submitted_at: Option<DateTime<Utc>>,
    pub ethics_approved_at: Option<DateTime<Utc>>,
    pub missing_documents: Vec<String>,
    pub target_patients: i64,
    pub enrolled_patients: i64,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub recruitment_periods: Vec<RecruitmentWindow>,
}

/// Per-rule-type counters of one scheduler run.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RuleRunDetail {
    pub alert_type: AlertKind,
    pub generated: u64,
    pub skipped: u64,
    pub resolved: u64,
    pub errors: u64,
    /// Human-readable error descriptions, for the operator.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub error_messages: Vec<String>,
}

impl RuleRunDetail {
    pub fn empty(alert_type: AlertKind) -> Self {
        Self {
            alert_type,
            generated: 0,
            skipped: 0,
            resolved: 0,
            errors: 0,
            error_messages: Vec::new(),
        }
    }
}

/// The result of one complete invocation of the scheduler across all rule
/// types. Always produced, even when the run failed fatally.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub total_generated: u64,
    pub total_skipped: u64,
    pub total_errors: u64,
    pub details: Vec<RuleRunDetail>,
    /// Set when the data store became unreachable mid-run. The summary is
    /// still returned so the external scheduler can alert operators.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fatal_error: Option<String>,
}

impl RunSummary {
    pub fn from_details(details: Vec<RuleRunDetail>) -> Self {
        let total_generated = details.iter().map(|d| d.generated).sum();
        let total_skipped = details.iter().map(|d| d.skipped).sum();
        let total_errors = details.iter().map(|d| d.errors).sum();
        Self {
            total_generated,
            total_skipped,
            total_errors,
            details,
            fatal_error: None,
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            total_generated: 0,
            total_skipped: 0,
            total_errors: 0,
            details: Vec::new(),
            fatal_error: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alert_kind_round_trips_through_strings() {
        for kind in AlertKind::ALL {
            let parsed: AlertKind = kind.as_str().parse().unwrap();
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn payload_serializes_with_kind_tag() {
        let payload = AlertPayload::LowCompletion {
            percentage: 42.5,
            threshold: 65,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["kind"], "low_completion");
        assert_eq!(json["threshold"], 65);
    }

    #[test]
    fn notification_kind_tracks_severity() {
        assert_eq!(
            NotificationKind::from_severity(Severity::Low),
            NotificationKind::Info
        );
        assert_eq!(
            NotificationKind::from_severity(Severity::Critical),
            NotificationKind::Error
        );
    }

    #[test]
    fn run_summary_totals_add_up() {
        let mut a = RuleRunDetail::empty(AlertKind::EthicsApprovalPending);
        a.generated = 2;
        a.errors = 1;
        let mut b = RuleRunDetail::empty(AlertKind::LowCompletionRate);
        b.skipped = 3;
        let summary = RunSummary::from_details(vec![a, b]);
        assert_eq!(summary.total_generated, 2);
        assert_eq!(summary.total_skipped, 3);
        assert_eq!(summary.total_errors, 1);
        assert!(summary.fatal_error.is_none());
    }
}
