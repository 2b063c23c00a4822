use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;

use crate::{models::Identity, services::ServiceError, AppState};

fn bearer_token(req: &Request) -> Option<&str> {
    let value = req.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Authentication gate: resolve the bearer token to an active identity and
/// attach it to the request before any handler or policy runs.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(token) = bearer_token(&req) else {
        return Err(ServiceError::Unauthenticated.into());
    };

    let identity = state.auth_service.authenticate(token).await?;
    tracing::debug!(user_id = %identity.id, "Request authenticated");

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

/// The identity resolved by [`auth_middleware`].
pub struct CurrentIdentity(pub Identity);

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .map(CurrentIdentity)
            .ok_or_else(|| ServiceError::Unauthenticated.into())
    }
}
