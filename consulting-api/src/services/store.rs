use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::error::ServiceError;
use crate::models::{ContentItem, GrantKind, Organization, ResourceKind, Role, TokenGrant, User};

/// What consuming a single-use grant does to the identity.
#[derive(Debug, Clone)]
pub enum GrantEffect {
    /// Replace the password hash (password reset).
    SetPassword(String),
    /// Mark the email address verified.
    MarkVerified,
}

/// Field-level changes to an identity. Credentials and grants are never part
/// of it; they change only through `set_password`, `set_grant` and
/// `consume_grant`, so a stale read can never put a spent grant back.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub name: Option<String>,
    /// Also clears `verified` and any pending verification grant.
    pub email: Option<String>,
    pub role: Option<Role>,
    pub active: Option<bool>,
}

/// Credential store: identities and their single-use grants.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Fails with `Conflict` when the email is already taken.
    async fn insert_user(&self, user: &User) -> Result<(), ServiceError>;
    async fn find_user_by_id(&self, id: &str) -> Result<Option<User>, ServiceError>;
    /// `email` must already be normalized.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ServiceError>;
    async fn list_users(&self, organization: Option<&str>) -> Result<Vec<User>, ServiceError>;
    /// Apply `update` in place and return the updated identity. Fails with
    /// `NotFound` for unknown ids and `Conflict` for a taken email.
    async fn update_user(
        &self,
        id: &str,
        update: &UserUpdate,
        at: DateTime<Utc>,
    ) -> Result<User, ServiceError>;
    /// Set a new password hash and drop any pending reset grant.
    async fn set_password(
        &self,
        id: &str,
        password_hash: &str,
        at: DateTime<Utc>,
    ) -> Result<(), ServiceError>;
    async fn set_user_organization(
        &self,
        id: &str,
        organization: Option<&str>,
    ) -> Result<(), ServiceError>;
    async fn record_login(&self, id: &str, at: DateTime<Utc>) -> Result<(), ServiceError>;
    /// Store `grant` on the identity, replacing any previous grant of that kind.
    async fn set_grant(
        &self,
        id: &str,
        kind: GrantKind,
        grant: &TokenGrant,
    ) -> Result<(), ServiceError>;
    /// Atomically match an unexpired grant by hash, apply `effect` and clear
    /// the grant. Returns the updated identity, or `None` when nothing matched.
    async fn consume_grant(
        &self,
        kind: GrantKind,
        token_hash: &str,
        now: DateTime<Utc>,
        effect: GrantEffect,
    ) -> Result<Option<User>, ServiceError>;
}

#[async_trait]
pub trait OrganizationStore: Send + Sync {
    /// Fails with `Conflict` when the slug is already taken.
    async fn insert_organization(&self, org: &Organization) -> Result<(), ServiceError>;
    async fn find_organization(&self, id: &str) -> Result<Option<Organization>, ServiceError>;
    async fn find_organization_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<Organization>, ServiceError>;
    async fn list_organizations(&self) -> Result<Vec<Organization>, ServiceError>;
    async fn replace_organization(&self, org: &Organization) -> Result<(), ServiceError>;
    async fn delete_organization(&self, id: &str) -> Result<bool, ServiceError>;
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn insert_content(&self, item: &ContentItem) -> Result<(), ServiceError>;
    async fn find_content(
        &self,
        kind: ResourceKind,
        id: &str,
    ) -> Result<Option<ContentItem>, ServiceError>;
    /// Newest first. `None` lists every tenant.
    async fn list_content(
        &self,
        kind: ResourceKind,
        organization: Option<&str>,
    ) -> Result<Vec<ContentItem>, ServiceError>;
    async fn replace_content(&self, item: &ContentItem) -> Result<(), ServiceError>;
    async fn delete_content(&self, kind: ResourceKind, id: &str) -> Result<bool, ServiceError>;
    /// Remove every item of every kind owned by `organization`.
    async fn delete_organization_content(&self, organization: &str) -> Result<u64, ServiceError>;
}

/// Everything the API needs from persistence.
#[async_trait]
pub trait Store: IdentityStore + OrganizationStore + ContentStore {
    async fn health_check(&self) -> Result<(), ServiceError>;
}
