use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tower::ServiceExt;
use vigia_alert::engine::CheckEngine;
use vigia_common::types::{AlertConfig, AlertKind, HospitalSnapshot};
use vigia_notify::channels::inapp::InAppChannel;
use vigia_notify::dispatch::DispatchOrchestrator;
use vigia_notify::NotificationChannel;
use vigia_server::adapters::{StoreDirectory, StoreFeed};
use vigia_server::app::build_http_app;
use vigia_server::config::ServerConfig;
use vigia_server::rate_limit::{FixedWindowRateLimiter, RateLimitStore};
use vigia_server::scheduler::AlertPipeline;
use vigia_server::state::AppState;
use vigia_storage::store::{AlertListFilter, DispatchLogFilter};
use vigia_storage::Store;

// One database file per test; pooled connections against `sqlite::memory:`
// each see their own empty database, so tests use a real file.
async fn temp_store() -> (Arc<Store>, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("temp dir");
    let url = format!("sqlite://{}/test.db?mode=rwc", dir.path().display());
    let store = Store::new(&url).await.expect("test store");
    (Arc::new(store), dir)
}

fn default_config(kind: AlertKind, threshold: Option<i64>) -> AlertConfig {
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

async fn seed_configs(store: &Store) {
    for (kind, threshold) in [
        (AlertKind::EthicsApprovalPending, Some(14)),
        (AlertKind::MissingDocumentation, None),
        (AlertKind::UpcomingRecruitmentPeriod, Some(30)),
        (AlertKind::NoActivity30Days, Some(30)),
        (AlertKind::LowCompletionRate, Some(65)),
    ] {
        store
            .upsert_alert_config(&default_config(kind, threshold))
            .await
            .unwrap();
    }
}

/// A hospital that violates nothing: active, documented, recently touched,
/// fully enrolled.
fn quiet_hospital(id: &str) -> HospitalSnapshot {
    let now = Utc::now();
    HospitalSnapshot {
        hospital_id: id.to_string(),
        project_id: None,
        name: format!("Hospital {id}"),
        active: true,
        ethics_submitted_at: None,
        ethics_approved_at: None,
        missing_documents: Vec::new(),
        target_patients: 100,
        enrolled_patients: 100,
        last_activity_at: Some(now),
        created_at: now - Duration::days(200),
        recruitment_periods: Vec::new(),
    }
}

async fn build_pipeline(store: Arc<Store>) -> Arc<AlertPipeline> {
    let feed = Arc::new(StoreFeed(store.clone()));
    let channels: Vec<Arc<dyn NotificationChannel>> = vec![Arc::new(InAppChannel::new(feed))];
    let orchestrator = Arc::new(DispatchOrchestrator::new(
        Arc::new(StoreDirectory(store.clone())),
        channels,
        4,
    ));
    Arc::new(AlertPipeline::new(
        store,
        Arc::new(CheckEngine::with_default_checks()),
        orchestrator,
        4,
    ))
}

#[tokio::test]
async fn full_run_generates_dedups_and_resolves() {
    let (store, _dir) = temp_store().await;
    seed_configs(&store).await;
    store
        .create_user(
            "ana",
            "$2b$12$C6UzMDM.H6dfI/f/IKcEeO6ZQZkXO6r7t6V1rN1v1sQ0eGHfTCjOW",
            Some("ana@example.org"),
            "Ana",
            "admin",
            None,
        )
        .await
        .unwrap();

    let mut hospital = quiet_hospital("h-1");
    hospital.ethics_submitted_at = Some(Utc::now() - Duration::days(21));
    store.insert_hospital(&hospital).await.unwrap();

    let pipeline = build_pipeline(store.clone()).await;

    // First run: the ethics violation becomes exactly one alert and one
    // in-app notification for the admin.
    let first = pipeline.run_all_checks().await;
    assert!(first.fatal_error.is_none());
    assert_eq!(first.total_generated, 1);
    assert_eq!(first.total_errors, 0);

    let open = store.list_open_alerts().await.unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].key.kind, AlertKind::EthicsApprovalPending);

    let admin = store.get_user_by_username("ana").await.unwrap().unwrap();
    let feed = store
        .list_notifications_for_user(&admin.id, None, 10, 0)
        .await
        .unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].title, "Ethics approval pending");

    // The audit trail has the in-app outcome.
    let logs = store
        .list_dispatch_logs(
            &DispatchLogFilter {
                alert_id_eq: Some(open[0].id.clone()),
                ..Default::default()
            },
            10,
            0,
        )
        .await
        .unwrap();
    assert!(logs
        .iter()
        .any(|l| l.channel == "in_app" && l.status == "sent"));

    // Second run against unchanged state: deduplication makes it a no-op
    // with a skip count matching the first run's generation count.
    let second = pipeline.run_all_checks().await;
    assert_eq!(second.total_generated, 0);
    let ethics_detail = second
        .details
        .iter()
        .find(|d| d.alert_type == AlertKind::EthicsApprovalPending)
        .unwrap();
    assert_eq!(ethics_detail.skipped, first.total_generated);

    // No duplicate notification was written.
    let feed = store
        .list_notifications_for_user(&admin.id, None, 10, 0)
        .await
        .unwrap();
    assert_eq!(feed.len(), 1);

    // Approval clears the condition: the next run resolves the alert and
    // creates nothing new.
    store
        .approve_hospital_ethics("h-1", Utc::now())
        .await
        .unwrap();
    let third = pipeline.run_all_checks().await;
    assert_eq!(third.total_generated, 0);
    let ethics_detail = third
        .details
        .iter()
        .find(|d| d.alert_type == AlertKind::EthicsApprovalPending)
        .unwrap();
    assert_eq!(ethics_detail.resolved, 1);

    assert!(store.list_open_alerts().await.unwrap().is_empty());
    let all = store
        .list_alerts(&AlertListFilter::default(), 10, 0)
        .await
        .unwrap();
    assert_eq!(all.len(), 1);
    assert!(all[0].is_resolved);
    assert!(all[0].resolved_at.is_some());
}

#[tokio::test]
async fn summary_is_complete_despite_bad_and_missing_configuration() {
    let (store, _dir) = temp_store().await;
    // low_completion_rate is enabled but misconfigured (no threshold);
    // upcoming_recruitment_period has no configuration row at all.
    for (kind, threshold) in [
        (AlertKind::EthicsApprovalPending, Some(14)),
        (AlertKind::MissingDocumentation, None),
        (AlertKind::NoActivity30Days, Some(30)),
        (AlertKind::LowCompletionRate, None),
    ] {
        store
            .upsert_alert_config(&default_config(kind, threshold))
            .await
            .unwrap();
    }
    let mut hospital = quiet_hospital("h-1");
    hospital.missing_documents = vec!["insurance certificate".to_string()];
    store.insert_hospital(&hospital).await.unwrap();

    let pipeline = build_pipeline(store.clone()).await;
    let summary = pipeline.run_all_checks().await;

    // Every rule type reports a detail entry even when misconfigured.
    assert!(summary.fatal_error.is_none());
    assert_eq!(summary.details.len(), AlertKind::ALL.len());
    // The healthy rule still generated its alert.
    assert_eq!(summary.total_generated, 1);
    // One error for the bad threshold, one for the missing row.
    assert_eq!(summary.total_errors, 2);

    let completion = summary
        .details
        .iter()
        .find(|d| d.alert_type == AlertKind::LowCompletionRate)
        .unwrap();
    assert_eq!(completion.errors, 1);
    assert_eq!(completion.generated, 0);
}

#[tokio::test]
async fn disabled_rule_generates_nothing() {
    let (store, _dir) = temp_store().await;
    seed_configs(&store).await;
    let mut disabled = default_config(AlertKind::MissingDocumentation, None);
    disabled.enabled = false;
    store.upsert_alert_config(&disabled).await.unwrap();

    let mut hospital = quiet_hospital("h-1");
    hospital.missing_documents = vec!["delegation log".to_string()];
    store.insert_hospital(&hospital).await.unwrap();

    let pipeline = build_pipeline(store.clone()).await;
    let summary = pipeline.run_all_checks().await;
    assert_eq!(summary.total_generated, 0);
    assert_eq!(summary.total_errors, 0);
}

fn test_state(store: Arc<Store>, pipeline: Arc<AlertPipeline>) -> AppState {
    let orchestrator = Arc::new(DispatchOrchestrator::new(
        Arc::new(StoreDirectory(store.clone())),
        vec![],
        4,
    ));
    let rate_limiter: Arc<dyn RateLimitStore> =
        Arc::new(FixedWindowRateLimiter::per_hour(1));
    AppState {
        store,
        pipeline,
        orchestrator,
        rate_limiter,
        jwt_secret: Arc::new("test-secret".to_string()),
        token_expire_secs: 3600,
        trigger_token: Arc::new("trigger-secret".to_string()),
        start_time: Utc::now(),
        config: Arc::new(ServerConfig::default()),
    }
}

#[tokio::test]
async fn trigger_endpoint_requires_secret_and_rate_limits() {
    let (store, _dir) = temp_store().await;
    seed_configs(&store).await;
    let pipeline = build_pipeline(store.clone()).await;
    let app = build_http_app(test_state(store, pipeline));

    // No credentials.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/alerts/run")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Wrong secret.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/alerts/run")
                .header("Authorization", "Bearer wrong")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Correct secret: a structured summary comes back.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/alerts/run")
                .header("Authorization", "Bearer trigger-secret")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["success"], true);
    assert!(json["results"]["details"].is_array());
    assert_eq!(json["results"]["totalGenerated"], 0);

    // The fixed window allows one run per hour in this test state.
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/alerts/run")
                .header("Authorization", "Bearer trigger-secret")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn jwt_is_required_for_the_protected_surface() {
    let (store, _dir) = temp_store().await;
    seed_configs(&store).await;
    let pipeline = build_pipeline(store.clone()).await;
    let app = build_http_app(test_state(store, pipeline));

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/v1/alerts")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Health stays public.
    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/v1/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
