use axum::{extract::State, Json};
use service_core::error::AppError;

use crate::{
    dtos::{
        auth::{PasswordResetConfirm, PasswordResetRequest},
        ErrorResponse, MessageResponse,
    },
    services::TokenResponse,
    utils::ValidatedJson,
    AppState,
};

const RESET_REQUESTED: &str =
    "If your email is registered, you will receive a password reset link shortly.";

/// Request a password reset link
///
/// The answer is the same whether or not the address is registered.
#[utoipa::path(
    post,
    path = "/auth/password-reset/request",
    request_body = PasswordResetRequest,
    responses(
        (status = 200, description = "Request received", body = MessageResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 429, description = "Too many attempts", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn request_password_reset(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<PasswordResetRequest>,
) -> Json<MessageResponse> {
    if let Err(e) = state.auth_service.request_password_reset(&req.email).await {
        tracing::error!(error = %e, "Failed to process password reset request");
    }
    Json(MessageResponse::new(RESET_REQUESTED))
}

/// Set a new password with a reset token
#[utoipa::path(
    post,
    path = "/auth/password-reset/confirm",
    request_body = PasswordResetConfirm,
    responses(
        (status = 200, description = "Password reset; a fresh token is returned", body = TokenResponse),
        (status = 400, description = "Invalid or expired token", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn confirm_password_reset(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<PasswordResetConfirm>,
) -> Result<Json<TokenResponse>, AppError> {
    Ok(Json(state.auth_service.confirm_password_reset(req).await?))
}
