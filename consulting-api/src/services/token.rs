use chrono::Duration;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use super::clock::Clock;
use super::error::ServiceError;
use crate::config::TokenConfig;

/// Issues and verifies the bearer tokens handed out at login.
///
/// Tokens are HS256 JWTs bound to one identity id. Expiry is checked against
/// the injected [`Clock`] with no leeway, so a token is dead at its `exp`
/// instant.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiry_minutes: i64,
    clock: Arc<dyn Clock>,
}

/// Claims carried by a bearer token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (identity id)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Token id
    pub jti: String,
}

/// Token response returned to client
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    #[schema(example = "Bearer")]
    pub token_type: String,
    /// Lifetime in seconds
    #[schema(example = 86400)]
    pub expires_in: i64,
}

impl TokenService {
    pub fn new(config: &TokenConfig, clock: Arc<dyn Clock>) -> Self {
        let secret = config.secret.expose_secret().as_bytes();

        tracing::info!(
            expiry_minutes = config.expiry_minutes,
            "Token service initialized with HS256 secret"
        );

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            expiry_minutes: config.expiry_minutes,
            clock,
        }
    }

    /// Issue a token for `identity_id`, valid for the configured lifetime.
    pub fn issue(&self, identity_id: &str) -> Result<String, ServiceError> {
        let now = self.clock.now();
        let exp = now + Duration::minutes(self.expiry_minutes);

        let claims = TokenClaims {
            sub: identity_id.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Failed to encode token: {}", e)))
    }

    /// Issue a token wrapped in the response shape returned to clients.
    pub fn issue_response(&self, identity_id: &str) -> Result<TokenResponse, ServiceError> {
        Ok(TokenResponse {
            access_token: self.issue(identity_id)?,
            token_type: "Bearer".to_string(),
            expires_in: self.expiry_seconds(),
        })
    }

    /// Verify signature, shape and expiry; returns the bound identity id.
    pub fn verify(&self, token: &str) -> Result<String, ServiceError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;

        let claims = decode::<TokenClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| {
                tracing::debug!(error = %e, "Token rejected");
                ServiceError::InvalidOrExpiredToken
            })?
            .claims;

        if self.clock.now().timestamp() >= claims.exp {
            tracing::debug!(sub = %claims.sub, "Token expired");
            return Err(ServiceError::InvalidOrExpiredToken);
        }

        Ok(claims.sub)
    }

    pub fn expiry_seconds(&self) -> i64 {
        self.expiry_minutes * 60
    }
}
