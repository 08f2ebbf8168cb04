use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::{interval, Duration};
use vigia_alert::engine::{CheckEngine, EvalContext};
use vigia_common::types::{
    AlertConfig, AlertKind, AlertRecord, Channel, HospitalSnapshot, OpenAlert, RuleRunDetail,
    RunSummary,
};
use vigia_notify::dispatch::{AlertDispatch, DispatchOrchestrator, DispatchResult};
use vigia_notify::template::MessageTemplate;
use vigia_storage::store::DispatchLogRow;
use vigia_storage::Store;

/// Runs every rule type through evaluation, persistence, and dispatch.
///
/// One instance is shared by the in-process scheduler and the HTTP trigger
/// endpoint. The pipeline always returns a [`RunSummary`]; a storage failure
/// while loading run state is reported through `fatal_error` instead of a
/// panic so the external scheduler can alert operators.
pub struct AlertPipeline {
    store: Arc<Store>,
    engine: Arc<CheckEngine>,
    orchestrator: Arc<DispatchOrchestrator>,
    max_concurrent: usize,
}

impl AlertPipeline {
    pub fn new(
        store: Arc<Store>,
        engine: Arc<CheckEngine>,
        orchestrator: Arc<DispatchOrchestrator>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            store,
            engine,
            orchestrator,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// One complete run across all rule types.
    ///
    /// Rule types are evaluated on a bounded worker pool; a panicking or
    /// failing rule type is recorded in its detail entry and does not stop
    /// the others.
    pub async fn run_all_checks(&self) -> RunSummary {
        let configs = match self.store.list_alert_configs().await {
            Ok(configs) => configs,
            Err(e) => {
                tracing::error!(error = %e, "Alert run aborted: cannot load configurations");
                return RunSummary::fatal(format!("cannot load alert configurations: {e}"));
            }
        };
        let snapshots = match self.store.hospital_snapshots().await {
            Ok(snapshots) => snapshots,
            Err(e) => {
                tracing::error!(error = %e, "Alert run aborted: cannot load hospital state");
                return RunSummary::fatal(format!("cannot load hospital snapshots: {e}"));
            }
        };
        let open_alerts = match self.store.list_open_alerts().await {
            Ok(open) => open,
            Err(e) => {
                tracing::error!(error = %e, "Alert run aborted: cannot load open alerts");
                return RunSummary::fatal(format!("cannot load open alerts: {e}"));
            }
        };

        let configs_by_kind: HashMap<AlertKind, AlertConfig> = configs
            .into_iter()
            .map(|c| (c.alert_type, c))
            .collect();
        let snapshots: Arc<Vec<HospitalSnapshot>> = Arc::new(snapshots);
        let open_alerts: Arc<Vec<OpenAlert>> = Arc::new(open_alerts);

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut handles = Vec::new();
        let mut details = Vec::new();

        for kind in AlertKind::ALL {
            let Some(config) = configs_by_kind.get(&kind).cloned() else {
                let mut detail = RuleRunDetail::empty(kind);
                detail.errors = 1;
                detail
                    .error_messages
                    .push("no configuration row for this alert type".to_string());
                details.push(detail);
                continue;
            };

            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    let mut detail = RuleRunDetail::empty(kind);
                    detail.errors = 1;
                    detail.error_messages.push(format!("worker pool closed: {e}"));
                    details.push(detail);
                    continue;
                }
            };

            let store = self.store.clone();
            let engine = self.engine.clone();
            let orchestrator = self.orchestrator.clone();
            let snapshots = snapshots.clone();
            let open_alerts = open_alerts.clone();

            handles.push((
                kind,
                tokio::spawn(async move {
                    let _permit = permit;
                    run_one_rule(kind, config, store, engine, orchestrator, snapshots, open_alerts)
                        .await
                }),
            ));
        }

        for (kind, handle) in handles {
            match handle.await {
                Ok(detail) => details.push(detail),
                Err(e) => {
                    // A panic inside one rule type must not take the run down.
                    tracing::error!(alert_type = kind.as_str(), error = %e, "Rule task aborted");
                    let mut detail = RuleRunDetail::empty(kind);
                    detail.errors = 1;
                    detail.error_messages.push(format!("rule task aborted: {e}"));
                    details.push(detail);
                }
            }
        }

        details.sort_by_key(|d| AlertKind::ALL.iter().position(|k| *k == d.alert_type));
        let summary = RunSummary::from_details(details);
        tracing::info!(
            generated = summary.total_generated,
            skipped = summary.total_skipped,
            errors = summary.total_errors,
            "Alert run finished"
        );
        summary
    }
}

async fn run_one_rule(
    kind: AlertKind,
    config: AlertConfig,
    store: Arc<Store>,
    engine: Arc<CheckEngine>,
    orchestrator: Arc<DispatchOrchestrator>,
    snapshots: Arc<Vec<HospitalSnapshot>>,
    open_alerts: Arc<Vec<OpenAlert>>,
) -> RuleRunDetail {
    let mut detail = RuleRunDetail::empty(kind);

    let ctx = EvalContext {
        now: Utc::now(),
        hospitals: &snapshots,
        open_alerts: &open_alerts,
    };
    let outcome = engine.evaluate(kind, &config, &ctx);

    if outcome.disabled {
        tracing::info!(alert_type = kind.as_str(), "Rule disabled, nothing to do");
        return detail;
    }

    detail.skipped = outcome.skipped.len() as u64;
    for error in &outcome.errors {
        detail.errors += 1;
        detail.error_messages.push(error.to_string());
    }

    // Explicit resolve actions for cleared conditions.
    for open in outcome.resolved {
        match store.resolve_alert(&open.id, Utc::now()).await {
            Ok(Some(alert)) => {
                detail.resolved += 1;
                tracing::info!(
                    alert_id = %alert.id,
                    alert_type = kind.as_str(),
                    "Alert condition cleared, resolved"
                );
            }
            Ok(None) => {}
            Err(e) => {
                detail.errors += 1;
                detail
                    .error_messages
                    .push(format!("failed to resolve alert {}: {e}", open.id));
            }
        }
    }

    let template = load_template(&store, &config, &mut detail).await;

    for candidate in outcome.generated {
        match store.insert_alert(&candidate).await {
            Ok(Some(alert)) => {
                detail.generated += 1;
                dispatch_alert(
                    &store,
                    &orchestrator,
                    &config,
                    template.as_ref(),
                    &alert,
                    &mut detail,
                )
                .await;
            }
            // Lost the insert race against a concurrent run: the violation
            // is already tracked, count it with the other duplicates.
            Ok(None) => detail.skipped += 1,
            Err(e) => {
                detail.errors += 1;
                detail
                    .error_messages
                    .push(format!("failed to persist alert: {e}"));
            }
        }
    }

    detail
}

/// Load the configured email template, degrading to the raw-alert fallback
/// on any problem.
async fn load_template(
    store: &Store,
    config: &AlertConfig,
    detail: &mut RuleRunDetail,
) -> Option<MessageTemplate> {
    let template_id = config.email_template_id.as_deref()?;
    match store.get_template(template_id).await {
        Ok(Some(row)) => Some(MessageTemplate {
            subject: row.subject,
            body: row.body,
            declared: row.variables,
        }),
        Ok(None) => {
            tracing::warn!(
                alert_type = config.alert_type.as_str(),
                template_id,
                "Configured template not found, using raw alert text"
            );
            None
        }
        Err(e) => {
            detail.errors += 1;
            detail
                .error_messages
                .push(format!("failed to load template {template_id}: {e}"));
            None
        }
    }
}

async fn dispatch_alert(
    store: &Store,
    orchestrator: &DispatchOrchestrator,
    config: &AlertConfig,
    template: Option<&MessageTemplate>,
    alert: &AlertRecord,
    detail: &mut RuleRunDetail,
) {
    let hospital_name = match &alert.hospital_id {
        Some(id) => store.get_hospital_name(id).await.unwrap_or_else(|e| {
            tracing::warn!(hospital_id = %id, error = %e, "Hospital name lookup failed");
            None
        }),
        None => None,
    };
    let project_name = match &alert.project_id {
        Some(id) => store.get_project_name(id).await.unwrap_or_else(|e| {
            tracing::warn!(project_id = %id, error = %e, "Project name lookup failed");
            None
        }),
        None => None,
    };

    let result = orchestrator
        .dispatch_alert(AlertDispatch {
            alert,
            config,
            template,
            hospital_name: hospital_name.as_deref(),
            project_name: project_name.as_deref(),
        })
        .await;

    match result {
        Ok(result) => {
            // In-app writes only fail when the store does; surface those as
            // run errors, unlike ordinary channel failures.
            for delivery in &result.deliveries {
                if delivery.channel == Channel::InApp
                    && delivery.outcome.status_str() == "failed"
                {
                    detail.errors += 1;
                    detail.error_messages.push(format!(
                        "in-app write failed for user {}: {}",
                        delivery.user_id,
                        delivery.outcome.reason().unwrap_or("unknown")
                    ));
                }
            }

            if template.is_some() {
                if let Some(template_id) = config.email_template_id.as_deref() {
                    if let Err(e) = store.increment_template_usage(template_id).await {
                        tracing::warn!(template_id, error = %e, "Template usage bump failed");
                    }
                }
            }

            record_dispatch_logs(store, Some(&alert.id), None, &result, detail).await;
        }
        Err(e) => {
            detail.errors += 1;
            detail
                .error_messages
                .push(format!("dispatch failed for alert {}: {e}", alert.id));
        }
    }
}

/// Persist the per-(recipient, channel) audit trail of one dispatch.
async fn record_dispatch_logs(
    store: &Store,
    alert_id: Option<&str>,
    communication_batch_id: Option<&str>,
    result: &DispatchResult,
    detail: &mut RuleRunDetail,
) {
    let now = Utc::now();
    let rows: Vec<DispatchLogRow> = result
        .deliveries
        .iter()
        .map(|d| DispatchLogRow {
            id: String::new(),
            alert_id: alert_id.map(str::to_string),
            communication_batch_id: communication_batch_id.map(str::to_string),
            channel: d.channel.to_string(),
            user_id: d.user_id.clone(),
            status: d.outcome.status_str().to_string(),
            reason: d.outcome.reason().map(str::to_string),
            created_at: now,
        })
        .collect();

    if let Err(e) = store.insert_dispatch_logs(&rows).await {
        detail.errors += 1;
        detail
            .error_messages
            .push(format!("failed to record dispatch outcomes: {e}"));
    }
}

/// Periodic driver for [`AlertPipeline`], used when the deployment relies on
/// the in-process timer instead of an external cron hitting the trigger
/// endpoint.
pub struct AlertCheckScheduler {
    pipeline: Arc<AlertPipeline>,
    interval_secs: u64,
}

impl AlertCheckScheduler {
    pub fn new(pipeline: Arc<AlertPipeline>, interval_secs: u64) -> Self {
        Self {
            pipeline,
            interval_secs: interval_secs.max(60),
        }
    }

    pub async fn run(&self) {
        tracing::info!(
            interval_secs = self.interval_secs,
            "Alert check scheduler started"
        );
        let mut tick = interval(Duration::from_secs(self.interval_secs));
        // The first tick fires immediately; skip it so a restart does not
        // double-run right after an external trigger.
        tick.tick().await;
        loop {
            tick.tick().await;
            let summary = self.pipeline.run_all_checks().await;
            if let Some(fatal) = &summary.fatal_error {
                tracing::error!(error = %fatal, "Scheduled alert run failed");
            }
        }
    }
}
