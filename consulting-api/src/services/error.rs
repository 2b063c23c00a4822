use service_core::error::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),

    /// No usable credentials: missing, malformed or expired token, unknown or
    /// inactive identity, wrong password.
    #[error("Authentication required")]
    Unauthenticated,

    /// Authenticated, but the policy denies the operation.
    #[error("Not permitted: {0}")]
    Unauthorized(String),

    #[error("Invalid or expired token")]
    InvalidOrExpiredToken,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Email error: {0}")]
    Email(String),
}

impl ServiceError {
    pub fn unauthorized(reason: impl Into<String>) -> Self {
        ServiceError::Unauthorized(reason.into())
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Database(e) => AppError::from(e),
            ServiceError::Internal(e) => AppError::InternalError(e),
            ServiceError::Unauthenticated => {
                AppError::AuthError(anyhow::anyhow!("Authentication required"))
            }
            ServiceError::Unauthorized(reason) => AppError::Forbidden(anyhow::anyhow!(reason)),
            ServiceError::InvalidOrExpiredToken => {
                AppError::BadRequest(anyhow::anyhow!("Invalid or expired token"))
            }
            ServiceError::NotFound(what) => AppError::NotFound(anyhow::anyhow!("{} not found", what)),
            ServiceError::Conflict(msg) => AppError::Conflict(anyhow::anyhow!(msg)),
            ServiceError::Validation(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            ServiceError::Email(msg) => AppError::EmailError(msg),
        }
    }
}
