use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;

use crate::{
    dtos::{
        organizations::{
            AddMemberRequest, ContactRequest, CreateOrganizationRequest, UpdateMemberRequest,
            UpdateOrganizationRequest,
        },
        ErrorResponse, MessageResponse,
    },
    middleware::CurrentIdentity,
    models::Organization,
    utils::ValidatedJson,
    AppState,
};

/// Found a new organization; the caller becomes its owner
#[utoipa::path(
    post,
    path = "/organizations",
    request_body = CreateOrganizationRequest,
    responses(
        (status = 201, description = "Organization created", body = Organization),
        (status = 403, description = "Caller already belongs to an organization", body = ErrorResponse),
        (status = 409, description = "Slug already taken", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Organizations"
)]
pub async fn create_organization(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    ValidatedJson(req): ValidatedJson<CreateOrganizationRequest>,
) -> Result<impl IntoResponse, AppError> {
    let org = state.organization_service.create(&identity, req).await?;
    Ok((StatusCode::CREATED, Json(org)))
}

#[utoipa::path(
    get,
    path = "/organizations",
    responses(
        (status = 200, description = "Organizations visible to the caller", body = Vec<Organization>),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Organizations"
)]
pub async fn list_organizations(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
) -> Result<Json<Vec<Organization>>, AppError> {
    Ok(Json(state.organization_service.list(&identity).await?))
}

#[utoipa::path(
    get,
    path = "/organizations/{id}",
    params(("id" = String, Path, description = "Organization id")),
    responses(
        (status = 200, description = "Organization", body = Organization),
        (status = 403, description = "Not a member", body = ErrorResponse),
        (status = 404, description = "Organization not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Organizations"
)]
pub async fn get_organization(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    Path(id): Path<String>,
) -> Result<Json<Organization>, AppError> {
    Ok(Json(state.organization_service.get(&identity, &id).await?))
}

#[utoipa::path(
    patch,
    path = "/organizations/{id}",
    params(("id" = String, Path, description = "Organization id")),
    request_body = UpdateOrganizationRequest,
    responses(
        (status = 200, description = "Organization updated", body = Organization),
        (status = 403, description = "Organization admin required", body = ErrorResponse),
        (status = 404, description = "Organization not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Organizations"
)]
pub async fn update_organization(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    Path(id): Path<String>,
    ValidatedJson(req): ValidatedJson<UpdateOrganizationRequest>,
) -> Result<Json<Organization>, AppError> {
    Ok(Json(
        state
            .organization_service
            .update(&identity, &id, req)
            .await?,
    ))
}

/// Delete an organization with all of its content
#[utoipa::path(
    delete,
    path = "/organizations/{id}",
    params(("id" = String, Path, description = "Organization id")),
    responses(
        (status = 204, description = "Organization deleted"),
        (status = 403, description = "Organization admin required", body = ErrorResponse),
        (status = 404, description = "Organization not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Organizations"
)]
pub async fn delete_organization(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.organization_service.delete(&identity, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/organizations/{id}/members",
    params(("id" = String, Path, description = "Organization id")),
    request_body = AddMemberRequest,
    responses(
        (status = 201, description = "Member added", body = Organization),
        (status = 403, description = "Organization admin required", body = ErrorResponse),
        (status = 404, description = "Organization or user not found", body = ErrorResponse),
        (status = 409, description = "User already in an organization", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Organizations"
)]
pub async fn add_member(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    Path(id): Path<String>,
    ValidatedJson(req): ValidatedJson<AddMemberRequest>,
) -> Result<impl IntoResponse, AppError> {
    let org = state
        .organization_service
        .add_member(&identity, &id, req)
        .await?;
    Ok((StatusCode::CREATED, Json(org)))
}

#[utoipa::path(
    patch,
    path = "/organizations/{id}/members/{user_id}",
    params(
        ("id" = String, Path, description = "Organization id"),
        ("user_id" = String, Path, description = "Member's user id")
    ),
    request_body = UpdateMemberRequest,
    responses(
        (status = 200, description = "Member role changed", body = Organization),
        (status = 400, description = "Ownership cannot change", body = ErrorResponse),
        (status = 403, description = "Organization admin required", body = ErrorResponse),
        (status = 404, description = "Member not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Organizations"
)]
pub async fn update_member(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    Path((id, user_id)): Path<(String, String)>,
    Json(req): Json<UpdateMemberRequest>,
) -> Result<Json<Organization>, AppError> {
    Ok(Json(
        state
            .organization_service
            .update_member(&identity, &id, &user_id, req.role)
            .await?,
    ))
}

/// Remove a member; members may remove themselves
#[utoipa::path(
    delete,
    path = "/organizations/{id}/members/{user_id}",
    params(
        ("id" = String, Path, description = "Organization id"),
        ("user_id" = String, Path, description = "Member's user id")
    ),
    responses(
        (status = 200, description = "Member removed", body = Organization),
        (status = 400, description = "The owner cannot be removed", body = ErrorResponse),
        (status = 403, description = "Organization admin required", body = ErrorResponse),
        (status = 404, description = "Member not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Organizations"
)]
pub async fn remove_member(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    Path((id, user_id)): Path<(String, String)>,
) -> Result<Json<Organization>, AppError> {
    Ok(Json(
        state
            .organization_service
            .remove_member(&identity, &id, &user_id)
            .await?,
    ))
}

/// Public contact form for an organization
#[utoipa::path(
    post,
    path = "/organizations/{id}/contact",
    params(("id" = String, Path, description = "Organization id")),
    request_body = ContactRequest,
    responses(
        (status = 201, description = "Message received", body = MessageResponse),
        (status = 404, description = "Organization not found", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse)
    ),
    tag = "Organizations"
)]
pub async fn submit_contact(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidatedJson(req): ValidatedJson<ContactRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.organization_service.submit_contact(&id, req).await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("Thank you, we will be in touch")),
    ))
}
