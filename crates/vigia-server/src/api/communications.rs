use crate::api::pagination::PaginationParams;
use crate::api::{
    error_response, storage_error_response, success_empty_response, success_paginated_response,
    success_response,
};
use crate::auth::{require_admin, Claims};
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};
use vigia_common::types::Channel;
use vigia_notify::dispatch::ManualDispatch;
use vigia_storage::store::{CommunicationRow, DispatchLogRow};

/// Manual communication request (administrator action). Reuses the dispatch
/// orchestrator directly, bypassing the rule engine.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SendCommunicationRequest {
    pub recipient_ids: Vec<String>,
    pub subject: String,
    pub body: String,
    /// Requested channels besides the always-written in-app record
    /// (`email`, `push`).
    #[serde(default)]
    pub channels: Vec<String>,
    #[serde(default)]
    pub hospital_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
}

/// One per-(recipient, channel) outcome of a manual send.
#[derive(Serialize, ToSchema)]
pub struct DeliveryResponse {
    pub channel: String,
    pub user_id: String,
    pub status: String,
    pub reason: Option<String>,
}

/// Manual send result.
#[derive(Serialize, ToSchema)]
pub struct SendCommunicationResponse {
    pub batch_id: String,
    pub sent: usize,
    pub failed: usize,
    pub skipped: usize,
    pub deliveries: Vec<DeliveryResponse>,
}

/// Send a manual communication to a set of users.
#[utoipa::path(
    post,
    path = "/v1/communications",
    tag = "Communications",
    security(("bearer_auth" = [])),
    request_body = SendCommunicationRequest,
    responses(
        (status = 200, description = "Per-channel outcomes", body = SendCommunicationResponse),
        (status = 400, description = "Malformed request", body = crate::api::ApiError),
        (status = 403, description = "Not an administrator", body = crate::api::ApiError)
    )
)]
async fn send_communication(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Json(request): Json<SendCommunicationRequest>,
) -> impl IntoResponse {
    if let Err(response) = require_admin(&trace_id, &claims) {
        return response;
    }
    if request.recipient_ids.is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            &trace_id,
            "bad_request",
            "recipient_ids must not be empty",
        );
    }
    if request.subject.trim().is_empty() || request.body.trim().is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            &trace_id,
            "bad_request",
            "subject and body are required",
        );
    }
    let mut channels = Vec::new();
    for raw in &request.channels {
        match raw.parse::<Channel>() {
            Ok(channel) => channels.push(channel),
            Err(e) => {
                return error_response(StatusCode::BAD_REQUEST, &trace_id, "bad_request", &e);
            }
        }
    }

    let batch_id = vigia_common::id::next_id();
    let result = state
        .orchestrator
        .dispatch_manual(ManualDispatch {
            batch_id: &batch_id,
            sender_id: &claims.sub,
            recipient_ids: &request.recipient_ids,
            subject: &request.subject,
            body: &request.body,
            channels: &channels,
            hospital_id: request.hospital_id.as_deref(),
            project_id: request.project_id.as_deref(),
        })
        .await;

    let result = match result {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(error = %e, "Manual dispatch failed");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "recipient resolution failed",
            );
        }
    };

    // Audit trail; the send already happened, so a logging failure is
    // reported in logs but does not fail the request.
    let now = Utc::now();
    let rows: Vec<DispatchLogRow> = result
        .deliveries
        .iter()
        .map(|d| DispatchLogRow {
            id: String::new(),
            alert_id: None,
            communication_batch_id: Some(batch_id.clone()),
            channel: d.channel.to_string(),
            user_id: d.user_id.clone(),
            status: d.outcome.status_str().to_string(),
            reason: d.outcome.reason().map(str::to_string),
            created_at: now,
        })
        .collect();
    if let Err(e) = state.store.insert_dispatch_logs(&rows).await {
        tracing::error!(batch_id = %batch_id, error = %e, "Failed to record dispatch outcomes");
    }

    let deliveries: Vec<DeliveryResponse> = result
        .deliveries
        .iter()
        .map(|d| DeliveryResponse {
            channel: d.channel.to_string(),
            user_id: d.user_id.clone(),
            status: d.outcome.status_str().to_string(),
            reason: d.outcome.reason().map(str::to_string),
        })
        .collect();

    success_response(
        StatusCode::OK,
        &trace_id,
        SendCommunicationResponse {
            batch_id,
            sent: result.count("sent"),
            failed: result.count("failed"),
            skipped: result.count("skipped"),
            deliveries,
        },
    )
}

/// Inbox entry.
#[derive(Serialize, ToSchema)]
pub struct CommunicationResponse {
    pub id: String,
    pub sender_id: String,
    pub subject: String,
    pub body: String,
    pub hospital_id: Option<String>,
    pub project_id: Option<String>,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<CommunicationRow> for CommunicationResponse {
    fn from(r: CommunicationRow) -> Self {
        Self {
            id: r.id,
            sender_id: r.sender_id,
            subject: r.subject,
            body: r.body,
            hospital_id: r.hospital_id,
            project_id: r.project_id,
            read_at: r.read_at,
            created_at: r.created_at,
        }
    }
}

/// Inbox listing query parameters.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
struct ListCommunicationsParams {
    /// Only unread messages
    #[param(required = false)]
    #[serde(default)]
    unread_only: bool,
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

/// The current user's communication inbox, newest first.
#[utoipa::path(
    get,
    path = "/v1/communications",
    tag = "Communications",
    security(("bearer_auth" = [])),
    params(ListCommunicationsParams),
    responses(
        (status = 200, description = "Paginated inbox", body = Vec<CommunicationResponse>),
        (status = 401, description = "Not authenticated", body = crate::api::ApiError)
    )
)]
async fn list_communications(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Query(params): Query<ListCommunicationsParams>,
) -> impl IntoResponse {
    let pagination = PaginationParams {
        limit: params.limit,
        offset: params.offset,
    };
    let total = match state
        .store
        .count_communications_for_user(&claims.sub, params.unread_only)
        .await
    {
        Ok(total) => total,
        Err(e) => return storage_error_response(&trace_id, &e),
    };
    match state
        .store
        .list_communications_for_user(
            &claims.sub,
            params.unread_only,
            pagination.limit(),
            pagination.offset(),
        )
        .await
    {
        Ok(items) => {
            let items: Vec<CommunicationResponse> = items
                .into_iter()
                .map(CommunicationResponse::from)
                .collect();
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

/// Mark one communication read.
#[utoipa::path(
    post,
    path = "/v1/communications/{id}/read",
    tag = "Communications",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Communication ID")),
    responses(
        (status = 200, description = "Marked read"),
        (status = 404, description = "Not found", body = crate::api::ApiError)
    )
)]
async fn mark_communication_read(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state
        .store
        .mark_communication_read(&id, &claims.sub, Utc::now())
        .await
    {
        Ok(true) => success_empty_response(StatusCode::OK, &trace_id, "marked read"),
        Ok(false) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            "communication not found",
        ),
        Err(e) => storage_error_response(&trace_id, &e),
    }
}

pub fn communication_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(send_communication, list_communications))
        .routes(routes!(mark_communication_read))
}
