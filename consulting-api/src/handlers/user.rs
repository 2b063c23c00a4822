use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;

use crate::{
    dtos::{
        users::{
            ChangePasswordRequest, CreateUserRequest, UpdateProfileRequest, UpdateRoleRequest,
            UpdateStatusRequest, UserListQuery,
        },
        ErrorResponse, MessageResponse,
    },
    middleware::CurrentIdentity,
    models::SanitizedUser,
    utils::ValidatedJson,
    AppState,
};

/// Current identity's profile
#[utoipa::path(
    get,
    path = "/users/me",
    responses(
        (status = 200, description = "Profile", body = SanitizedUser),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn get_me(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
) -> Result<Json<SanitizedUser>, AppError> {
    Ok(Json(state.user_service.me(&identity).await?))
}

#[utoipa::path(
    patch,
    path = "/users/me",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = SanitizedUser),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn update_me(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    ValidatedJson(req): ValidatedJson<UpdateProfileRequest>,
) -> Result<Json<SanitizedUser>, AppError> {
    Ok(Json(state.user_service.update_profile(&identity, req).await?))
}

#[utoipa::path(
    post,
    path = "/users/me/password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Current password is incorrect", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn change_password(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    ValidatedJson(req): ValidatedJson<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .auth_service
        .change_password(&identity, &req.current_password, &req.new_password)
        .await?;
    Ok(Json(MessageResponse::new("Password changed successfully")))
}

/// List identities visible to the caller
#[utoipa::path(
    get,
    path = "/users",
    params(UserListQuery),
    responses(
        (status = 200, description = "Users", body = Vec<SanitizedUser>),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 403, description = "Organization or platform admin required", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn list_users(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    Query(query): Query<UserListQuery>,
) -> Result<Json<Vec<SanitizedUser>>, AppError> {
    Ok(Json(state.user_service.list(&identity, query.organization).await?))
}

#[utoipa::path(
    post,
    path = "/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = SanitizedUser),
        (status = 403, description = "Not allowed to create this user", body = ErrorResponse),
        (status = 404, description = "Organization not found", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn create_user(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    ValidatedJson(req): ValidatedJson<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state.user_service.create(&identity, req).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[utoipa::path(
    get,
    path = "/users/{id}",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "User", body = SanitizedUser),
        (status = 403, description = "Not allowed", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn get_user(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    Path(id): Path<String>,
) -> Result<Json<SanitizedUser>, AppError> {
    Ok(Json(state.user_service.get(&identity, &id).await?))
}

/// Activate or deactivate an identity (platform admins)
#[utoipa::path(
    patch,
    path = "/users/{id}/status",
    params(("id" = String, Path, description = "User id")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = SanitizedUser),
        (status = 400, description = "Cannot deactivate yourself", body = ErrorResponse),
        (status = 403, description = "Platform admin required", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn set_user_status(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<SanitizedUser>, AppError> {
    Ok(Json(
        state
            .user_service
            .set_status(&identity, &id, req.active)
            .await?,
    ))
}

/// Change an identity's platform role (platform admins)
#[utoipa::path(
    patch,
    path = "/users/{id}/role",
    params(("id" = String, Path, description = "User id")),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Role changed", body = SanitizedUser),
        (status = 403, description = "Platform admin required", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn set_user_role(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    Path(id): Path<String>,
    Json(req): Json<UpdateRoleRequest>,
) -> Result<Json<SanitizedUser>, AppError> {
    Ok(Json(
        state.user_service.set_role(&identity, &id, req.role).await?,
    ))
}
