use crate::api::pagination::PaginationParams;
use crate::api::{
    error_response, storage_error_response, success_paginated_response, success_response,
};
use crate::auth::{constant_time_eq, require_admin, Claims};
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};
use vigia_common::types::{AlertConfig, AlertKind, AlertRecord, RunSummary, Severity};
use vigia_storage::store::{AlertListFilter, DispatchLogFilter, DispatchLogRow};

/// Alert listing query parameters.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
struct ListAlertsParams {
    /// Alert type exact match
    #[param(required = false, rename = "type__eq")]
    #[serde(rename = "type__eq")]
    type_eq: Option<String>,
    /// Severity exact match (low / medium / high / critical)
    #[param(required = false, rename = "severity__eq")]
    #[serde(rename = "severity__eq")]
    severity_eq: Option<String>,
    /// Resolution state exact match
    #[param(required = false, rename = "is_resolved__eq")]
    #[serde(rename = "is_resolved__eq")]
    is_resolved_eq: Option<bool>,
    /// Target hospital exact match
    #[param(required = false, rename = "hospital_id__eq")]
    #[serde(rename = "hospital_id__eq")]
    hospital_id_eq: Option<String>,
    /// Target project exact match
    #[param(required = false, rename = "project_id__eq")]
    #[serde(rename = "project_id__eq")]
    project_id_eq: Option<String>,
    /// Page size (default 20)
    #[param(required = false)]
    #[serde(
        default,
        deserialize_with = "crate::api::pagination::deserialize_optional_u64"
    )]
    limit: Option<u64>,
    /// Offset (default 0)
    #[param(required = false)]
    #[serde(
        default,
        deserialize_with = "crate::api::pagination::deserialize_optional_u64"
    )]
    offset: Option<u64>,
}

fn parse_filter(
    trace_id: &str,
    params: &ListAlertsParams,
) -> Result<AlertListFilter, Response> {
    let alert_type_eq = match params.type_eq.as_deref() {
        Some(raw) => Some(raw.parse::<AlertKind>().map_err(|e| {
            error_response(StatusCode::BAD_REQUEST, trace_id, "bad_request", &e)
        })?),
        None => None,
    };
    let severity_eq = match params.severity_eq.as_deref() {
        Some(raw) => Some(raw.parse::<Severity>().map_err(|e| {
            error_response(StatusCode::BAD_REQUEST, trace_id, "bad_request", &e)
        })?),
        None => None,
    };
    Ok(AlertListFilter {
        alert_type_eq,
        severity_eq,
        is_resolved_eq: params.is_resolved_eq,
        hospital_id_eq: params.hospital_id_eq.clone(),
        project_id_eq: params.project_id_eq.clone(),
    })
}

/// List alerts, newest first.
#[utoipa::path(
    get,
    path = "/v1/alerts",
    tag = "Alerts",
    security(("bearer_auth" = [])),
    params(ListAlertsParams),
    responses(
        (status = 200, description = "Paginated alerts", body = Vec<AlertRecord>),
        (status = 401, description = "Not authenticated", body = crate::api::ApiError)
    )
)]
async fn list_alerts(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(params): Query<ListAlertsParams>,
) -> impl IntoResponse {
    let filter = match parse_filter(&trace_id, &params) {
        Ok(filter) => filter,
        Err(response) => return response,
    };
    let limit = PaginationParams {
        limit: params.limit,
        offset: params.offset,
    };

    let total = match state.store.count_alerts(&filter).await {
        Ok(total) => total,
        Err(e) => return storage_error_response(&trace_id, &e),
    };
    match state
        .store
        .list_alerts(&filter, limit.limit(), limit.offset())
        .await
    {
        Ok(items) => success_paginated_response(
            StatusCode::OK,
            &trace_id,
            items,
            total,
            limit.limit(),
            limit.offset(),
        ),
        Err(e) => storage_error_response(&trace_id, &e),
    }
}

/// One alert by ID.
#[utoipa::path(
    get,
    path = "/v1/alerts/{id}",
    tag = "Alerts",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Alert ID")),
    responses(
        (status = 200, description = "Alert detail", body = AlertRecord),
        (status = 404, description = "Not found", body = crate::api::ApiError)
    )
)]
async fn get_alert(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_alert(&id).await {
        Ok(Some(alert)) => success_response(StatusCode::OK, &trace_id, alert),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            "alert not found",
        ),
        Err(e) => storage_error_response(&trace_id, &e),
    }
}

/// Resolve an alert (administrator action).
#[utoipa::path(
    post,
    path = "/v1/alerts/{id}/resolve",
    tag = "Alerts",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Alert ID")),
    responses(
        (status = 200, description = "Alert resolved", body = AlertRecord),
        (status = 403, description = "Not an administrator", body = crate::api::ApiError),
        (status = 404, description = "Not found or already resolved", body = crate::api::ApiError)
    )
)]
async fn resolve_alert(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    if let Err(response) = require_admin(&trace_id, &claims) {
        return response;
    }
    match state.store.resolve_alert(&id, Utc::now()).await {
        Ok(Some(alert)) => {
            tracing::info!(alert_id = %id, resolved_by = %claims.sub, "Alert resolved manually");
            success_response(StatusCode::OK, &trace_id, alert)
        }
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            "alert not found or already resolved",
        ),
        Err(e) => storage_error_response(&trace_id, &e),
    }
}

/// Delivery audit trail of one alert.
#[utoipa::path(
    get,
    path = "/v1/alerts/{id}/deliveries",
    tag = "Alerts",
    security(("bearer_auth" = [])),
    params(
        ("id" = String, Path, description = "Alert ID"),
        PaginationParams
    ),
    responses(
        (status = 200, description = "Per-recipient, per-channel outcomes"),
        (status = 401, description = "Not authenticated", body = crate::api::ApiError)
    )
)]
async fn list_alert_deliveries(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(pagination): Query<PaginationParams>,
) -> impl IntoResponse {
    let filter = DispatchLogFilter {
        alert_id_eq: Some(id),
        ..Default::default()
    };
    let total = match state.store.count_dispatch_logs(&filter).await {
        Ok(total) => total,
        Err(e) => return storage_error_response(&trace_id, &e),
    };
    match state
        .store
        .list_dispatch_logs(&filter, pagination.limit(), pagination.offset())
        .await
    {
        Ok(items) => {
            let items: Vec<DispatchLogResponse> =
                items.into_iter().map(DispatchLogResponse::from).collect();
            success_paginated_response(
                StatusCode::OK,
                &trace_id,
                items,
                total,
                pagination.limit(),
                pagination.offset(),
            )
        }
        Err(e) => storage_error_response(&trace_id, &e),
    }
}

/// Dispatch audit trail entry.
#[derive(Serialize, ToSchema)]
pub struct DispatchLogResponse {
    pub id: String,
    pub alert_id: Option<String>,
    pub communication_batch_id: Option<String>,
    pub channel: String,
    pub user_id: String,
    pub status: String,
    pub reason: Option<String>,
    pub created_at: chrono::DateTime<Utc>,
}

impl From<DispatchLogRow> for DispatchLogResponse {
    fn from(r: DispatchLogRow) -> Self {
        Self {
            id: r.id,
            alert_id: r.alert_id,
            communication_batch_id: r.communication_batch_id,
            channel: r.channel,
            user_id: r.user_id,
            status: r.status,
            reason: r.reason,
            created_at: r.created_at,
        }
    }
}

/// All alert-type configurations.
#[utoipa::path(
    get,
    path = "/v1/alerts/configs",
    tag = "Alerts",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Alert configurations", body = Vec<AlertConfig>),
        (status = 401, description = "Not authenticated", body = crate::api::ApiError)
    )
)]
async fn list_alert_configs(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match state.store.list_alert_configs().await {
        Ok(configs) => success_response(StatusCode::OK, &trace_id, configs),
        Err(e) => storage_error_response(&trace_id, &e),
    }
}

/// Alert configuration update body.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateAlertConfigRequest {
    pub enabled: bool,
    pub notify_admin: bool,
    pub notify_coordinator: bool,
    pub auto_send_email: bool,
    #[serde(default)]
    pub threshold_value: Option<i64>,
    #[serde(default)]
    pub email_template_id: Option<String>,
}

/// Replace the configuration of one alert type (administrator action).
#[utoipa::path(
    put,
    path = "/v1/alerts/configs/{alert_type}",
    tag = "Alerts",
    security(("bearer_auth" = [])),
    params(("alert_type" = String, Path, description = "Alert type")),
    request_body = UpdateAlertConfigRequest,
    responses(
        (status = 200, description = "Updated configuration", body = AlertConfig),
        (status = 400, description = "Unknown alert type", body = crate::api::ApiError),
        (status = 403, description = "Not an administrator", body = crate::api::ApiError)
    )
)]
async fn update_alert_config(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Path(alert_type): Path<String>,
    Json(request): Json<UpdateAlertConfigRequest>,
) -> impl IntoResponse {
    if let Err(response) = require_admin(&trace_id, &claims) {
        return response;
    }
    let kind: AlertKind = match alert_type.parse() {
        Ok(kind) => kind,
        Err(e) => {
            return error_response(StatusCode::BAD_REQUEST, &trace_id, "bad_request", &e);
        }
    };
    if let Some(template_id) = request.email_template_id.as_deref() {
        match state.store.get_template(template_id).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    &trace_id,
                    "bad_request",
                    "email_template_id does not reference an existing template",
                );
            }
            Err(e) => return storage_error_response(&trace_id, &e),
        }
    }

    let config = AlertConfig {
        alert_type: kind,
        enabled: request.enabled,
        notify_admin: request.notify_admin,
        notify_coordinator: request.notify_coordinator,
        auto_send_email: request.auto_send_email,
        threshold_value: request.threshold_value,
        email_template_id: request.email_template_id,
    };
    match state.store.upsert_alert_config(&config).await {
        Ok(updated) => success_response(StatusCode::OK, &trace_id, updated),
        Err(e) => storage_error_response(&trace_id, &e),
    }
}

/// Trigger response, shaped for the external scheduler.
#[derive(Debug, Serialize, ToSchema)]
pub struct TriggerRunResponse {
    pub success: bool,
    pub results: RunSummary,
}

/// Run all alert checks now.
///
/// Authenticated by the shared trigger secret, not a user JWT; intended for
/// the external time-based scheduler.
#[utoipa::path(
    post,
    path = "/v1/alerts/run",
    tag = "Alerts",
    responses(
        (status = 200, description = "Run summary", body = TriggerRunResponse),
        (status = 401, description = "Bad or missing trigger secret", body = crate::api::ApiError),
        (status = 429, description = "Rate limited", body = crate::api::ApiError)
    )
)]
pub async fn run_alert_checks(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let presented = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .unwrap_or_default();

    if state.trigger_token.is_empty() || !constant_time_eq(presented, &state.trigger_token) {
        return error_response(
            StatusCode::UNAUTHORIZED,
            &trace_id,
            "unauthorized",
            "invalid trigger token",
        );
    }

    if !state.rate_limiter.check("alert_run", Utc::now()) {
        return error_response(
            StatusCode::TOO_MANY_REQUESTS,
            &trace_id,
            "rate_limited",
            "trigger rate limit exceeded",
        );
    }

    let results = state.pipeline.run_all_checks().await;
    let success = results.fatal_error.is_none();
    // Machine endpoint: the summary shape is the contract, no envelope.
    (
        StatusCode::OK,
        Json(TriggerRunResponse { success, results }),
    )
        .into_response()
}

pub fn alert_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_alerts))
        .routes(routes!(list_alert_configs))
        .routes(routes!(update_alert_config))
        .routes(routes!(get_alert))
        .routes(routes!(resolve_alert))
        .routes(routes!(list_alert_deliveries))
}
