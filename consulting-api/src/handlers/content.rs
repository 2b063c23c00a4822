use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;

use crate::{
    dtos::{
        content::{ContentListQuery, CreateContentRequest, UpdateContentRequest},
        ErrorResponse,
    },
    middleware::CurrentIdentity,
    models::{ContentItem, ResourceKind},
    services::ServiceError,
    utils::ValidatedJson,
    AppState,
};

fn parse_kind(segment: &str) -> Result<ResourceKind, AppError> {
    ResourceKind::from_path_segment(segment)
        .ok_or_else(|| ServiceError::NotFound("Resource type").into())
}

/// List content of one kind
#[utoipa::path(
    get,
    path = "/content/{kind}",
    params(
        ("kind" = String, Path, description = "projects, case-studies, services, blog-posts or contact-submissions"),
        ContentListQuery
    ),
    responses(
        (status = 200, description = "Items, newest first", body = Vec<ContentItem>),
        (status = 403, description = "Not a member of the organization", body = ErrorResponse),
        (status = 404, description = "Unknown resource type", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Content"
)]
pub async fn list_content(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    Path(kind): Path<String>,
    Query(query): Query<ContentListQuery>,
) -> Result<Json<Vec<ContentItem>>, AppError> {
    let kind = parse_kind(&kind)?;
    Ok(Json(
        state
            .content_service
            .list(&identity, kind, query.organization)
            .await?,
    ))
}

#[utoipa::path(
    post,
    path = "/content/{kind}",
    params(("kind" = String, Path, description = "Resource type")),
    request_body = CreateContentRequest,
    responses(
        (status = 201, description = "Item created", body = ContentItem),
        (status = 400, description = "No organization to create in", body = ErrorResponse),
        (status = 403, description = "Insufficient rights", body = ErrorResponse),
        (status = 404, description = "Unknown resource type or organization", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Content"
)]
pub async fn create_content(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    Path(kind): Path<String>,
    ValidatedJson(req): ValidatedJson<CreateContentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let kind = parse_kind(&kind)?;
    let item = state.content_service.create(&identity, kind, req).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

#[utoipa::path(
    get,
    path = "/content/{kind}/{id}",
    params(
        ("kind" = String, Path, description = "Resource type"),
        ("id" = String, Path, description = "Item id")
    ),
    responses(
        (status = 200, description = "Item", body = ContentItem),
        (status = 403, description = "Not a member of the organization", body = ErrorResponse),
        (status = 404, description = "Not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Content"
)]
pub async fn get_content(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    Path((kind, id)): Path<(String, String)>,
) -> Result<Json<ContentItem>, AppError> {
    let kind = parse_kind(&kind)?;
    Ok(Json(state.content_service.get(&identity, kind, &id).await?))
}

#[utoipa::path(
    patch,
    path = "/content/{kind}/{id}",
    params(
        ("kind" = String, Path, description = "Resource type"),
        ("id" = String, Path, description = "Item id")
    ),
    request_body = UpdateContentRequest,
    responses(
        (status = 200, description = "Item updated", body = ContentItem),
        (status = 403, description = "Insufficient rights", body = ErrorResponse),
        (status = 404, description = "Not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Content"
)]
pub async fn update_content(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    Path((kind, id)): Path<(String, String)>,
    ValidatedJson(req): ValidatedJson<UpdateContentRequest>,
) -> Result<Json<ContentItem>, AppError> {
    let kind = parse_kind(&kind)?;
    Ok(Json(
        state
            .content_service
            .update(&identity, kind, &id, req)
            .await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/content/{kind}/{id}",
    params(
        ("kind" = String, Path, description = "Resource type"),
        ("id" = String, Path, description = "Item id")
    ),
    responses(
        (status = 204, description = "Item deleted"),
        (status = 403, description = "Insufficient rights", body = ErrorResponse),
        (status = 404, description = "Not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Content"
)]
pub async fn delete_content(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    Path((kind, id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    let kind = parse_kind(&kind)?;
    state.content_service.delete(&identity, kind, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
