use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::hash_token;

/// Purpose of a single-use credential token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantKind {
    EmailVerification,
    PasswordReset,
}

impl GrantKind {
    /// Field on the user document holding this grant.
    pub fn field(&self) -> &'static str {
        match self {
            GrantKind::EmailVerification => "verification",
            GrantKind::PasswordReset => "password_reset",
        }
    }
}

/// A single-use token stored on the identity as a SHA-256 hash plus expiry.
///
/// The raw value only ever exists in the email sent to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenGrant {
    pub token_hash: String,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub expires_at: DateTime<Utc>,
}

impl TokenGrant {
    pub fn issue(raw_token: &str, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            token_hash: hash_token(raw_token),
            expires_at: now + ttl,
        }
    }

    /// Expired at the exact expiry instant, not just after it.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
