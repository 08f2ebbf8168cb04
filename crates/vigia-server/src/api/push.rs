use crate::api::{error_response, storage_error_response, success_empty_response, success_response};
use crate::auth::Claims;
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// Browser push subscription keys, as handed out by the Push API.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

/// Subscription registration body.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterSubscriptionRequest {
    pub endpoint: String,
    pub keys: SubscriptionKeys,
}

/// Registered subscription.
#[derive(Serialize, ToSchema)]
pub struct SubscriptionResponse {
    pub id: String,
    pub endpoint: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Register a push subscription for the current user. Idempotent per
/// endpoint: re-subscribing refreshes the keys.
#[utoipa::path(
    post,
    path = "/v1/push/subscriptions",
    tag = "Push",
    security(("bearer_auth" = [])),
    request_body = RegisterSubscriptionRequest,
    responses(
        (status = 201, description = "Subscription registered", body = SubscriptionResponse),
        (status = 400, description = "Malformed subscription", body = crate::api::ApiError)
    )
)]
async fn register_subscription(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Json(request): Json<RegisterSubscriptionRequest>,
) -> impl IntoResponse {
    if request.endpoint.is_empty()
        || request.keys.p256dh.is_empty()
        || request.keys.auth.is_empty()
    {
        return error_response(
            StatusCode::BAD_REQUEST,
            &trace_id,
            "bad_request",
            "endpoint and keys are required",
        );
    }
    match state
        .store
        .upsert_push_subscription(
            &claims.sub,
            &request.endpoint,
            &request.keys.p256dh,
            &request.keys.auth,
        )
        .await
    {
        Ok(row) => success_response(
            StatusCode::CREATED,
            &trace_id,
            SubscriptionResponse {
                id: row.id,
                endpoint: row.endpoint,
                created_at: row.created_at,
            },
        ),
        Err(e) => storage_error_response(&trace_id, &e),
    }
}

/// Unsubscribe query parameters.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
struct RemoveSubscriptionParams {
    /// The subscription endpoint to remove
    endpoint: String,
}

/// Remove a push subscription by endpoint.
#[utoipa::path(
    delete,
    path = "/v1/push/subscriptions",
    tag = "Push",
    security(("bearer_auth" = [])),
    params(RemoveSubscriptionParams),
    responses(
        (status = 200, description = "Subscription removed"),
        (status = 404, description = "Unknown endpoint", body = crate::api::ApiError)
    )
)]
async fn remove_subscription(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(params): Query<RemoveSubscriptionParams>,
) -> impl IntoResponse {
    match state
        .store
        .delete_push_subscription_by_endpoint(&params.endpoint)
        .await
    {
        Ok(true) => success_empty_response(StatusCode::OK, &trace_id, "subscription removed"),
        Ok(false) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            "no subscription for that endpoint",
        ),
        Err(e) => storage_error_response(&trace_id, &e),
    }
}

pub fn push_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(register_subscription, remove_subscription))
}
