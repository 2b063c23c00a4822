use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use validator::Validate;

use crate::{
    dtos::{
        auth::{AuthResponse, RegisterRequest, VerifyQuery},
        ErrorResponse, MessageResponse,
    },
    middleware::CurrentIdentity,
    utils::ValidatedJson,
    AppState,
};

/// Register a new identity
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Identity created and logged in", body = AuthResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 429, description = "Too many attempts", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let res = state.auth_service.register(req).await?;
    Ok((StatusCode::CREATED, Json(res)))
}

/// Verify an email address with the token from the verification email
#[utoipa::path(
    get,
    path = "/auth/verify",
    params(VerifyQuery),
    responses(
        (status = 200, description = "Email verified", body = MessageResponse),
        (status = 400, description = "Invalid or expired token", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn verify_email(
    State(state): State<AppState>,
    Query(query): Query<VerifyQuery>,
) -> Result<Json<MessageResponse>, AppError> {
    query.validate()?;
    state.auth_service.verify_email(&query.token).await?;
    Ok(Json(MessageResponse::new("Email verified successfully")))
}

/// Send a fresh verification email to the current identity
#[utoipa::path(
    post,
    path = "/auth/verify/resend",
    responses(
        (status = 200, description = "Verification email sent", body = MessageResponse),
        (status = 400, description = "Already verified", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Authentication"
)]
pub async fn resend_verification(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
) -> Result<Json<MessageResponse>, AppError> {
    state.auth_service.resend_verification(&identity).await?;
    Ok(Json(MessageResponse::new("Verification email sent")))
}
