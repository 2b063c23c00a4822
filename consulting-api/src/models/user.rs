//! Identity records: credentials, platform role and organization membership.

use chrono::{DateTime, Utc};
use mongodb::bson::DateTime as BsonDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::TokenGrant;

/// Platform-wide role of an identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    #[default]
    User,
    Consultant,
    Admin,
    SuperAdmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Consultant => "consultant",
            Role::Admin => "admin",
            Role::SuperAdmin => "super-admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "consultant" => Ok(Role::Consultant),
            "admin" => Ok(Role::Admin),
            "super-admin" => Ok(Role::SuperAdmin),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// Stored identity document (`users` collection).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    /// Always stored lower-cased.
    pub email: String,
    pub password_hash: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub organization: Option<String>,
    pub active: bool,
    #[serde(default)]
    pub verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification: Option<TokenGrant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_reset: Option<TokenGrant>,
    #[serde(default)]
    pub last_login: Option<BsonDateTime>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// New active, unverified identity. `email` must already be normalized
    /// and `password_hash` already computed.
    pub fn new(
        email: String,
        password_hash: String,
        name: Option<String>,
        role: Role,
        organization: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            email,
            password_hash,
            name,
            role,
            organization,
            active: true,
            verified: false,
            verification: None,
            password_reset: None,
            last_login: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn sanitized(&self) -> SanitizedUser {
        SanitizedUser::from(self.clone())
    }
}

/// Normalize an email for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// User view safe to return over the API: no hash, no grants.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SanitizedUser {
    #[schema(example = "550e8400-e29b-41d4-a716-446655440000")]
    pub id: String,
    #[schema(example = "jane@acme-consulting.com")]
    pub email: String,
    pub name: Option<String>,
    pub role: Role,
    pub organization: Option<String>,
    pub active: bool,
    pub verified: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for SanitizedUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            role: user.role,
            organization: user.organization,
            active: user.active,
            verified: user.verified,
            last_login: user.last_login.map(|dt| dt.to_chrono()),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_string(&Role::SuperAdmin).unwrap(),
            "\"super-admin\""
        );
        assert_eq!("Consultant".parse::<Role>().unwrap(), Role::Consultant);
        assert!("owner".parse::<Role>().is_err());
    }

    #[test]
    fn test_new_user_is_active_and_unverified() {
        let user = User::new(
            "a@b.com".to_string(),
            "$argon2id$hash".to_string(),
            None,
            Role::User,
            None,
        );
        assert!(user.active);
        assert!(!user.verified);
        assert!(user.last_login.is_none());
    }

    #[test]
    fn test_sanitized_user_omits_secrets() {
        let user = User::new(
            "a@b.com".to_string(),
            "$argon2id$secret-hash".to_string(),
            Some("Ada".to_string()),
            Role::Consultant,
            Some("org-1".to_string()),
        );
        let json = serde_json::to_string(&user.sanitized()).unwrap();
        assert!(!json.contains("secret-hash"));
        assert!(!json.contains("password"));
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Jane.Doe@Example.COM "), "jane.doe@example.com");
    }
}
