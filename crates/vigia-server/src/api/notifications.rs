use crate::api::pagination::PaginationParams;
use crate::api::{
    error_response, storage_error_response, success_empty_response, success_paginated_response,
};
use crate::auth::Claims;
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};
use vigia_storage::store::NotificationRow;

/// In-app feed entry.
#[derive(Serialize, ToSchema)]
pub struct NotificationResponse {
    pub id: String,
    pub title: String,
    pub message: String,
    pub kind: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl From<NotificationRow> for NotificationResponse {
    fn from(r: NotificationRow) -> Self {
        Self {
            id: r.id,
            title: r.title,
            message: r.message,
            kind: r.kind,
            is_read: r.is_read,
            created_at: r.created_at,
        }
    }
}

/// Feed listing query parameters.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
struct ListNotificationsParams {
    /// Read-state exact match
    #[param(required = false, rename = "is_read__eq")]
    #[serde(rename = "is_read__eq")]
    is_read_eq: Option<bool>,
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

/// The current user's notification feed, newest first.
#[utoipa::path(
    get,
    path = "/v1/notifications",
    tag = "Notifications",
    security(("bearer_auth" = [])),
    params(ListNotificationsParams),
    responses(
        (status = 200, description = "Paginated feed", body = Vec<NotificationResponse>),
        (status = 401, description = "Not authenticated", body = crate::api::ApiError)
    )
)]
async fn list_notifications(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Query(params): Query<ListNotificationsParams>,
) -> impl IntoResponse {
    let pagination = PaginationParams {
        limit: params.limit,
        offset: params.offset,
    };
    let total = match state
        .store
        .count_notifications_for_user(&claims.sub, params.is_read_eq)
        .await
    {
        Ok(total) => total,
        Err(e) => return storage_error_response(&trace_id, &e),
    };
    match state
        .store
        .list_notifications_for_user(
            &claims.sub,
            params.is_read_eq,
            pagination.limit(),
            pagination.offset(),
        )
        .await
    {
        Ok(items) => {
            let items: Vec<NotificationResponse> =
                items.into_iter().map(NotificationResponse::from).collect();
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

/// Mark one notification read.
#[utoipa::path(
    post,
    path = "/v1/notifications/{id}/read",
    tag = "Notifications",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Marked read"),
        (status = 404, description = "Not found", body = crate::api::ApiError)
    )
)]
async fn mark_notification_read(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.mark_notification_read(&id, &claims.sub).await {
        Ok(true) => success_empty_response(StatusCode::OK, &trace_id, "marked read"),
        Ok(false) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            "notification not found",
        ),
        Err(e) => storage_error_response(&trace_id, &e),
    }
}

/// Mark the whole feed read.
#[utoipa::path(
    post,
    path = "/v1/notifications/read-all",
    tag = "Notifications",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Feed marked read"),
        (status = 401, description = "Not authenticated", body = crate::api::ApiError)
    )
)]
async fn mark_all_notifications_read(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match state.store.mark_all_notifications_read(&claims.sub).await {
        Ok(count) => {
            success_empty_response(StatusCode::OK, &trace_id, &format!("{count} marked read"))
        }
        Err(e) => storage_error_response(&trace_id, &e),
    }
}

pub fn notification_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_notifications))
        .routes(routes!(mark_all_notifications_read))
        .routes(routes!(mark_notification_read))
}
