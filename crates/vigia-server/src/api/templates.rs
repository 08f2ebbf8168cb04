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
use vigia_storage::store::{TemplateFilter, TemplateRow, TemplateUpdate};

/// Communication template.
#[derive(Serialize, ToSchema)]
pub struct TemplateResponse {
    pub id: String,
    pub name: String,
    pub subject: String,
    pub body: String,
    pub variables: Vec<String>,
    pub category: String,
    pub usage_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<TemplateRow> for TemplateResponse {
    fn from(r: TemplateRow) -> Self {
        Self {
            id: r.id,
            name: r.name,
            subject: r.subject,
            body: r.body,
            variables: r.variables,
            category: r.category,
            usage_count: r.usage_count,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// Template creation body.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateTemplateRequest {
    pub name: String,
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub variables: Vec<String>,
    #[serde(default = "default_category")]
    pub category: String,
}

fn default_category() -> String {
    "general".to_string()
}

/// Template listing query parameters.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
struct ListTemplatesParams {
    /// Name substring match
    #[param(required = false, rename = "name__contains")]
    #[serde(rename = "name__contains")]
    name_contains: Option<String>,
    /// Category exact match
    #[param(required = false, rename = "category__eq")]
    #[serde(rename = "category__eq")]
    category_eq: Option<String>,
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

/// List templates.
#[utoipa::path(
    get,
    path = "/v1/templates",
    tag = "Templates",
    security(("bearer_auth" = [])),
    params(ListTemplatesParams),
    responses(
        (status = 200, description = "Paginated templates", body = Vec<TemplateResponse>),
        (status = 401, description = "Not authenticated", body = crate::api::ApiError)
    )
)]
async fn list_templates(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(params): Query<ListTemplatesParams>,
) -> impl IntoResponse {
    let filter = TemplateFilter {
        name_contains: params.name_contains.clone(),
        category_eq: params.category_eq.clone(),
    };
    let pagination = PaginationParams {
        limit: params.limit,
        offset: params.offset,
    };
    let total = match state.store.count_templates(&filter).await {
        Ok(total) => total,
        Err(e) => return storage_error_response(&trace_id, &e),
    };
    match state
        .store
        .list_templates(&filter, pagination.limit(), pagination.offset())
        .await
    {
        Ok(items) => {
            let items: Vec<TemplateResponse> =
                items.into_iter().map(TemplateResponse::from).collect();
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

/// Create a template (administrator action). Names are unique.
#[utoipa::path(
    post,
    path = "/v1/templates",
    tag = "Templates",
    security(("bearer_auth" = [])),
    request_body = CreateTemplateRequest,
    responses(
        (status = 201, description = "Created template", body = TemplateResponse),
        (status = 403, description = "Not an administrator", body = crate::api::ApiError),
        (status = 409, description = "Name already in use", body = crate::api::ApiError)
    )
)]
async fn create_template(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Json(request): Json<CreateTemplateRequest>,
) -> impl IntoResponse {
    if let Err(response) = require_admin(&trace_id, &claims) {
        return response;
    }
    if request.name.trim().is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            &trace_id,
            "bad_request",
            "template name is required",
        );
    }
    match state
        .store
        .create_template(
            &request.name,
            &request.subject,
            &request.body,
            &request.variables,
            &request.category,
        )
        .await
    {
        Ok(row) => success_response(
            StatusCode::CREATED,
            &trace_id,
            TemplateResponse::from(row),
        ),
        Err(e) => storage_error_response(&trace_id, &e),
    }
}

/// One template by ID.
#[utoipa::path(
    get,
    path = "/v1/templates/{id}",
    tag = "Templates",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Template ID")),
    responses(
        (status = 200, description = "Template detail", body = TemplateResponse),
        (status = 404, description = "Not found", body = crate::api::ApiError)
    )
)]
async fn get_template(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_template(&id).await {
        Ok(Some(row)) => success_response(StatusCode::OK, &trace_id, TemplateResponse::from(row)),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            "template not found",
        ),
        Err(e) => storage_error_response(&trace_id, &e),
    }
}

/// Update a template (administrator action).
#[utoipa::path(
    put,
    path = "/v1/templates/{id}",
    tag = "Templates",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Template ID")),
    responses(
        (status = 200, description = "Updated template", body = TemplateResponse),
        (status = 404, description = "Not found", body = crate::api::ApiError),
        (status = 409, description = "Name already in use", body = crate::api::ApiError)
    )
)]
async fn update_template(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<TemplateUpdate>,
) -> impl IntoResponse {
    if let Err(response) = require_admin(&trace_id, &claims) {
        return response;
    }
    match state.store.update_template(&id, &update).await {
        Ok(Some(row)) => success_response(StatusCode::OK, &trace_id, TemplateResponse::from(row)),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            "template not found",
        ),
        Err(e) => storage_error_response(&trace_id, &e),
    }
}

/// Delete a template (administrator action).
#[utoipa::path(
    delete,
    path = "/v1/templates/{id}",
    tag = "Templates",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Template ID")),
    responses(
        (status = 200, description = "Deleted"),
        (status = 404, description = "Not found", body = crate::api::ApiError)
    )
)]
async fn delete_template(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    if let Err(response) = require_admin(&trace_id, &claims) {
        return response;
    }
    match state.store.delete_template(&id).await {
        Ok(true) => success_empty_response(StatusCode::OK, &trace_id, "template deleted"),
        Ok(false) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            "template not found",
        ),
        Err(e) => storage_error_response(&trace_id, &e),
    }
}

pub fn template_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_templates, create_template))
        .routes(routes!(get_template, update_template, delete_template))
}
