use crate::error::StorageError;
use crate::store::{AlertListFilter, Store};
use chrono::Utc;
use vigia_common::types::{AlertKind, AlertPayload, CandidateAlert, NotificationKind, Severity};

// One database file per test; pooled connections against `sqlite::memory:`
// each see their own empty database, so tests use a real file.
async fn temp_store() -> (Store, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("temp dir");
    let url = format!("sqlite://{}/test.db?mode=rwc", dir.path().display());
    let store = Store::new(&url).await.expect("test store");
    (store, dir)
}

fn ethics_candidate(hospital_id: &str) -> CandidateAlert {
    CandidateAlert {
        kind: AlertKind::EthicsApprovalPending,
        hospital_id: Some(hospital_id.to_string()),
        project_id: None,
        severity: Severity::Medium,
        title: "Ethics approval pending".into(),
        message: format!("Hospital {hospital_id} has been awaiting ethics approval"),
        payload: AlertPayload::EthicsPending { days_pending: 21 },
    }
}

#[tokio::test]
async fn open_alert_unique_index_blocks_duplicates() {
    let (store, _dir) = temp_store().await;

    let first = store.insert_alert(&ethics_candidate("h-1")).await.unwrap();
    assert!(first.is_some());

    // Same dedup key while the first is unresolved: the partial unique
    // index rejects the row and the insert downgrades to None.
    let second = store.insert_alert(&ethics_candidate("h-1")).await.unwrap();
    assert!(second.is_none());

    // A different hospital is a different key.
    let other = store.insert_alert(&ethics_candidate("h-2")).await.unwrap();
    assert!(other.is_some());
}

#[tokio::test]
async fn resolving_reopens_the_dedup_key() {
    let (store, _dir) = temp_store().await;

    let first = store
        .insert_alert(&ethics_candidate("h-1"))
        .await
        .unwrap()
        .unwrap();
    let resolved = store.resolve_alert(&first.id, Utc::now()).await.unwrap();
    assert!(resolved.unwrap().is_resolved);

    // Resolving twice is a no-op.
    assert!(store
        .resolve_alert(&first.id, Utc::now())
        .await
        .unwrap()
        .is_none());

    // The key is free again; history keeps both rows.
    let reopened = store.insert_alert(&ethics_candidate("h-1")).await.unwrap();
    assert!(reopened.is_some());
    let open = store.list_open_alerts().await.unwrap();
    assert_eq!(open.len(), 1);
    let all = store
        .list_alerts(&AlertListFilter::default(), 100, 0)
        .await
        .unwrap();
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn alert_filters_apply() {
    let (store, _dir) = temp_store().await;
    store.insert_alert(&ethics_candidate("h-1")).await.unwrap();
    let mut low = ethics_candidate("h-2");
    low.kind = AlertKind::LowCompletionRate;
    low.severity = Severity::High;
    low.payload = AlertPayload::LowCompletion {
        percentage: 40.0,
        threshold: 65,
    };
    store.insert_alert(&low).await.unwrap();

    let filter = AlertListFilter {
        severity_eq: Some(Severity::High),
        ..Default::default()
    };
    let rows = store.list_alerts(&filter, 100, 0).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].kind, AlertKind::LowCompletionRate);
    assert_eq!(store.count_alerts(&filter).await.unwrap(), 1);
}

#[tokio::test]
async fn template_name_must_be_unique() {
    let (store, _dir) = temp_store().await;
    store
        .create_template("welcome", "Hi {{name}}", "Body", &["name".into()], "general")
        .await
        .unwrap();

    let err = store
        .create_template("welcome", "Other", "Other", &[], "general")
        .await
        .unwrap_err();
    let storage_err = err.downcast_ref::<StorageError>().expect("typed error");
    assert!(matches!(storage_err, StorageError::Conflict { .. }));
}

#[tokio::test]
async fn template_usage_counter_increments() {
    let (store, _dir) = temp_store().await;
    let t = store
        .create_template("reminder", "S", "B", &[], "alerts")
        .await
        .unwrap();
    store.increment_template_usage(&t.id).await.unwrap();
    store.increment_template_usage(&t.id).await.unwrap();
    let loaded = store.get_template(&t.id).await.unwrap().unwrap();
    assert_eq!(loaded.usage_count, 2);
}

#[tokio::test]
async fn push_subscription_upsert_and_atomic_delete() {
    let (store, _dir) = temp_store().await;
    let endpoint = "https://push.example.org/send/abc";

    let created = store
        .upsert_push_subscription("u-1", endpoint, "p256dh-a", "auth-a")
        .await
        .unwrap();
    // Re-subscribe from the same endpoint: keys and owner are refreshed,
    // no unique-constraint failure, same logical row.
    let updated = store
        .upsert_push_subscription("u-2", endpoint, "p256dh-b", "auth-b")
        .await
        .unwrap();
    assert_eq!(created.id, updated.id);
    assert_eq!(updated.user_id, "u-2");

    assert!(store
        .delete_push_subscription_by_endpoint(endpoint)
        .await
        .unwrap());
    assert!(!store
        .delete_push_subscription_by_endpoint(endpoint)
        .await
        .unwrap());
}

#[tokio::test]
async fn notification_read_is_scoped_to_owner() {
    let (store, _dir) = temp_store().await;
    let n = store
        .insert_notification("u-1", "Title", "Message", NotificationKind::Warning)
        .await
        .unwrap();

    assert!(!store.mark_notification_read(&n.id, "intruder").await.unwrap());
    assert!(store.mark_notification_read(&n.id, "u-1").await.unwrap());

    let unread = store
        .list_notifications_for_user("u-1", Some(false), 10, 0)
        .await
        .unwrap();
    assert!(unread.is_empty());
}

#[tokio::test]
async fn communication_read_round_trip() {
    let (store, _dir) = temp_store().await;
    let c = store
        .insert_communication("admin-1", "u-1", "Subject", "Body", None, None)
        .await
        .unwrap();
    assert_eq!(store.count_communications_for_user("u-1", true).await.unwrap(), 1);
    assert!(store
        .mark_communication_read(&c.id, "u-1", Utc::now())
        .await
        .unwrap());
    assert_eq!(store.count_communications_for_user("u-1", true).await.unwrap(), 0);
}
