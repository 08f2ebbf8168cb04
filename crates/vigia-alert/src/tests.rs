use crate::engine::{CheckEngine, EvalContext};
use crate::CheckError;
use chrono::{DateTime, Duration, Utc};
use vigia_common::types::{
    AlertConfig, AlertKind, DedupKey, HospitalSnapshot, OpenAlert, RecruitmentWindow,
};

pub(crate) fn hospital(id: &str) -> HospitalSnapshot {
    let now = Utc::now();
    HospitalSnapshot {
        hospital_id: id.to_string(),
        project_id: Some("proj-1".to_string()),
        name: format!("Hospital {id}"),
        active: false,
        ethics_submitted_at: None,
        ethics_approved_at: None,
        missing_documents: Vec::new(),
        target_patients: 100,
        enrolled_patients: 100,
        last_activity_at: Some(now),
        created_at: now - Duration::days(365),
        recruitment_periods: Vec::new(),
    }
}

pub(crate) fn window(id: &str, starts_at: DateTime<Utc>, length_days: i64) -> RecruitmentWindow {
    RecruitmentWindow {
        id: id.to_string(),
        starts_at,
        ends_at: starts_at + Duration::days(length_days),
    }
}

pub(crate) fn config(kind: AlertKind, threshold: Option<i64>) -> AlertConfig {
    AlertConfig {
        alert_type: kind,
        enabled: true,
        notify_admin: true,
        notify_coordinator: false,
        auto_send_email: false,
        threshold_value: threshold,
        email_template_id: None,
    }
}

fn open_alert(id: &str, kind: AlertKind, hospital_id: &str) -> OpenAlert {
    OpenAlert {
        id: id.to_string(),
        key: DedupKey {
            kind,
            hospital_id: Some(hospital_id.to_string()),
            project_id: Some("proj-1".to_string()),
        },
    }
}

#[test]
fn second_pass_skips_what_the_first_generated() {
    let engine = CheckEngine::with_default_checks();
    let now = Utc::now();
    let mut h = hospital("h-1");
    h.ethics_submitted_at = Some(now - Duration::days(30));
    let hospitals = vec![h];
    let cfg = config(AlertKind::EthicsApprovalPending, Some(14));

    let first = engine.evaluate(
        AlertKind::EthicsApprovalPending,
        &cfg,
        &EvalContext {
            now,
            hospitals: &hospitals,
            open_alerts: &[],
        },
    );
    assert_eq!(first.generated.len(), 1);
    assert!(first.skipped.is_empty());

    // Same state, but the violation is now tracked by an open alert.
    let open = vec![open_alert("a-1", AlertKind::EthicsApprovalPending, "h-1")];
    let second = engine.evaluate(
        AlertKind::EthicsApprovalPending,
        &cfg,
        &EvalContext {
            now,
            hospitals: &hospitals,
            open_alerts: &open,
        },
    );
    assert!(second.generated.is_empty());
    assert_eq!(second.skipped.len(), first.generated.len());
    assert!(second.resolved.is_empty());
}

#[test]
fn cleared_condition_resolves_without_regenerating() {
    let engine = CheckEngine::with_default_checks();
    let now = Utc::now();
    let mut h = hospital("h-1");
    h.ethics_submitted_at = Some(now - Duration::days(30));
    h.ethics_approved_at = Some(now - Duration::hours(2));
    let hospitals = vec![h];
    let open = vec![open_alert("a-1", AlertKind::EthicsApprovalPending, "h-1")];

    let outcome = engine.evaluate(
        AlertKind::EthicsApprovalPending,
        &config(AlertKind::EthicsApprovalPending, Some(14)),
        &EvalContext {
            now,
            hospitals: &hospitals,
            open_alerts: &open,
        },
    );
    assert!(outcome.generated.is_empty());
    assert_eq!(outcome.resolved.len(), 1);
    assert_eq!(outcome.resolved[0].id, "a-1");
}

#[test]
fn vanished_or_erroring_hospitals_leave_alerts_open() {
    let engine = CheckEngine::with_default_checks();
    let now = Utc::now();
    // h-1 errors (future submission), h-2 is gone from the snapshot.
    let mut broken = hospital("h-1");
    broken.ethics_submitted_at = Some(now + Duration::days(1));
    let hospitals = vec![broken];
    let open = vec![
        open_alert("a-1", AlertKind::EthicsApprovalPending, "h-1"),
        open_alert("a-2", AlertKind::EthicsApprovalPending, "h-2"),
    ];

    let outcome = engine.evaluate(
        AlertKind::EthicsApprovalPending,
        &config(AlertKind::EthicsApprovalPending, Some(14)),
        &EvalContext {
            now,
            hospitals: &hospitals,
            open_alerts: &open,
        },
    );
    assert_eq!(outcome.errors.len(), 1);
    assert!(outcome.resolved.is_empty());
}

#[test]
fn disabled_config_skips_the_rule_without_errors() {
    let engine = CheckEngine::with_default_checks();
    let now = Utc::now();
    let mut h = hospital("h-1");
    h.ethics_submitted_at = Some(now - Duration::days(100));
    let hospitals = vec![h];
    let mut cfg = config(AlertKind::EthicsApprovalPending, Some(14));
    cfg.enabled = false;

    let outcome = engine.evaluate(
        AlertKind::EthicsApprovalPending,
        &cfg,
        &EvalContext {
            now,
            hospitals: &hospitals,
            open_alerts: &[],
        },
    );
    assert!(outcome.disabled);
    assert!(outcome.generated.is_empty());
    assert!(outcome.errors.is_empty());
}

#[test]
fn missing_threshold_is_a_configuration_error() {
    let engine = CheckEngine::with_default_checks();
    let now = Utc::now();
    let hospitals = vec![hospital("h-1")];

    let outcome = engine.evaluate(
        AlertKind::LowCompletionRate,
        &config(AlertKind::LowCompletionRate, None),
        &EvalContext {
            now,
            hospitals: &hospitals,
            open_alerts: &[],
        },
    );
    assert_eq!(outcome.errors.len(), 1);
    assert!(outcome.errors[0].is_configuration());
    assert!(outcome.generated.is_empty());

    // missing_documentation takes no threshold, so None is fine there.
    let outcome = engine.evaluate(
        AlertKind::MissingDocumentation,
        &config(AlertKind::MissingDocumentation, None),
        &EvalContext {
            now,
            hospitals: &hospitals,
            open_alerts: &[],
        },
    );
    assert!(outcome.errors.is_empty());
}

#[test]
fn entity_errors_do_not_abort_the_rest() {
    let engine = CheckEngine::with_default_checks();
    let now = Utc::now();
    let mut broken = hospital("h-bad");
    broken.ethics_submitted_at = Some(now + Duration::days(3));
    let mut violating = hospital("h-late");
    violating.ethics_submitted_at = Some(now - Duration::days(20));
    let hospitals = vec![broken, violating];

    let outcome = engine.evaluate(
        AlertKind::EthicsApprovalPending,
        &config(AlertKind::EthicsApprovalPending, Some(14)),
        &EvalContext {
            now,
            hospitals: &hospitals,
            open_alerts: &[],
        },
    );
    assert_eq!(outcome.errors.len(), 1);
    assert!(matches!(
        outcome.errors[0],
        CheckError::MalformedEntity { .. }
    ));
    assert_eq!(outcome.generated.len(), 1);
    assert_eq!(
        outcome.generated[0].hospital_id.as_deref(),
        Some("h-late")
    );
}

#[test]
fn engine_registers_every_kind() {
    let engine = CheckEngine::with_default_checks();
    for kind in AlertKind::ALL {
        assert!(engine.get_check(kind).is_some(), "missing check for {kind}");
    }
}
