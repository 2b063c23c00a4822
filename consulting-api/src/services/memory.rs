use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::DateTime as BsonDateTime;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use subtle::ConstantTimeEq;

use super::error::ServiceError;
use super::store::{
    ContentStore, GrantEffect, IdentityStore, OrganizationStore, Store, UserUpdate,
};
use crate::models::{ContentItem, GrantKind, Organization, ResourceKind, TokenGrant, User};

/// Process-local store used by tests and by `STORE_BACKEND=memory` runs.
///
/// Each collection sits behind its own mutex; no guard is held across an await.
#[derive(Default)]
pub struct InMemoryStore {
    users: Mutex<HashMap<String, User>>,
    organizations: Mutex<HashMap<String, Organization>>,
    content: Mutex<HashMap<(ResourceKind, String), ContentItem>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, ServiceError> {
    mutex
        .lock()
        .map_err(|e| ServiceError::Internal(anyhow::anyhow!("In-memory store poisoned: {}", e)))
}

fn grant_slot(user: &mut User, kind: GrantKind) -> &mut Option<TokenGrant> {
    match kind {
        GrantKind::EmailVerification => &mut user.verification,
        GrantKind::PasswordReset => &mut user.password_reset,
    }
}

fn grant_matches(grant: &TokenGrant, token_hash: &str, now: DateTime<Utc>) -> bool {
    let same: bool = grant
        .token_hash
        .as_bytes()
        .ct_eq(token_hash.as_bytes())
        .into();
    same && !grant.is_expired_at(now)
}

#[async_trait]
impl IdentityStore for InMemoryStore {
    async fn insert_user(&self, user: &User) -> Result<(), ServiceError> {
        let mut users = lock(&self.users)?;
        if users.values().any(|u| u.email == user.email) {
            return Err(ServiceError::Conflict("Email already registered".to_string()));
        }
        users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn find_user_by_id(&self, id: &str) -> Result<Option<User>, ServiceError> {
        Ok(lock(&self.users)?.get(id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ServiceError> {
        Ok(lock(&self.users)?
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn list_users(&self, organization: Option<&str>) -> Result<Vec<User>, ServiceError> {
        let mut users: Vec<User> = lock(&self.users)?
            .values()
            .filter(|u| organization.is_none() || u.organization.as_deref() == organization)
            .cloned()
            .collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(users)
    }

    async fn update_user(
        &self,
        id: &str,
        update: &UserUpdate,
        at: DateTime<Utc>,
    ) -> Result<User, ServiceError> {
        let mut users = lock(&self.users)?;
        if let Some(email) = &update.email {
            if users.values().any(|u| u.id != id && &u.email == email) {
                return Err(ServiceError::Conflict("Email already registered".to_string()));
            }
        }

        let user = users.get_mut(id).ok_or(ServiceError::NotFound("User"))?;
        if let Some(name) = &update.name {
            user.name = Some(name.clone());
        }
        if let Some(email) = &update.email {
            user.email = email.clone();
            user.verified = false;
            user.verification = None;
        }
        if let Some(role) = update.role {
            user.role = role;
        }
        if let Some(active) = update.active {
            user.active = active;
        }
        user.updated_at = at;
        Ok(user.clone())
    }

    async fn set_password(
        &self,
        id: &str,
        password_hash: &str,
        at: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        let mut users = lock(&self.users)?;
        let user = users.get_mut(id).ok_or(ServiceError::NotFound("User"))?;
        user.password_hash = password_hash.to_string();
        user.password_reset = None;
        user.updated_at = at;
        Ok(())
    }

    async fn set_user_organization(
        &self,
        id: &str,
        organization: Option<&str>,
    ) -> Result<(), ServiceError> {
        let mut users = lock(&self.users)?;
        let user = users.get_mut(id).ok_or(ServiceError::NotFound("User"))?;
        user.organization = organization.map(str::to_string);
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn record_login(&self, id: &str, at: DateTime<Utc>) -> Result<(), ServiceError> {
        let mut users = lock(&self.users)?;
        let user = users.get_mut(id).ok_or(ServiceError::NotFound("User"))?;
        user.last_login = Some(BsonDateTime::from_chrono(at));
        Ok(())
    }

    async fn set_grant(
        &self,
        id: &str,
        kind: GrantKind,
        grant: &TokenGrant,
    ) -> Result<(), ServiceError> {
        let mut users = lock(&self.users)?;
        let user = users.get_mut(id).ok_or(ServiceError::NotFound("User"))?;
        *grant_slot(user, kind) = Some(grant.clone());
        Ok(())
    }

    async fn consume_grant(
        &self,
        kind: GrantKind,
        token_hash: &str,
        now: DateTime<Utc>,
        effect: GrantEffect,
    ) -> Result<Option<User>, ServiceError> {
        // Match, apply and clear under one guard.
        let mut users = lock(&self.users)?;
        let Some(user) = users.values_mut().find(|u| {
            match kind {
                GrantKind::EmailVerification => u.verification.as_ref(),
                GrantKind::PasswordReset => u.password_reset.as_ref(),
            }
            .is_some_and(|g| grant_matches(g, token_hash, now))
        }) else {
            return Ok(None);
        };

        match effect {
            GrantEffect::SetPassword(hash) => user.password_hash = hash,
            GrantEffect::MarkVerified => user.verified = true,
        }
        *grant_slot(user, kind) = None;
        user.updated_at = now;

        Ok(Some(user.clone()))
    }
}

#[async_trait]
impl OrganizationStore for InMemoryStore {
    async fn insert_organization(&self, org: &Organization) -> Result<(), ServiceError> {
        let mut orgs = lock(&self.organizations)?;
        if orgs.values().any(|o| o.slug == org.slug) {
            return Err(ServiceError::Conflict(format!(
                "Organization slug '{}' already taken",
                org.slug
            )));
        }
        orgs.insert(org.id.clone(), org.clone());
        Ok(())
    }

    async fn find_organization(&self, id: &str) -> Result<Option<Organization>, ServiceError> {
        Ok(lock(&self.organizations)?.get(id).cloned())
    }

    async fn find_organization_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<Organization>, ServiceError> {
        Ok(lock(&self.organizations)?
            .values()
            .find(|o| o.slug == slug)
            .cloned())
    }

    async fn list_organizations(&self) -> Result<Vec<Organization>, ServiceError> {
        let mut orgs: Vec<Organization> = lock(&self.organizations)?.values().cloned().collect();
        orgs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(orgs)
    }

    async fn replace_organization(&self, org: &Organization) -> Result<(), ServiceError> {
        let mut orgs = lock(&self.organizations)?;
        if orgs.values().any(|o| o.id != org.id && o.slug == org.slug) {
            return Err(ServiceError::Conflict(format!(
                "Organization slug '{}' already taken",
                org.slug
            )));
        }
        match orgs.get_mut(&org.id) {
            Some(existing) => {
                *existing = org.clone();
                Ok(())
            }
            None => Err(ServiceError::NotFound("Organization")),
        }
    }

    async fn delete_organization(&self, id: &str) -> Result<bool, ServiceError> {
        Ok(lock(&self.organizations)?.remove(id).is_some())
    }
}

#[async_trait]
impl ContentStore for InMemoryStore {
    async fn insert_content(&self, item: &ContentItem) -> Result<(), ServiceError> {
        lock(&self.content)?.insert((item.kind, item.id.clone()), item.clone());
        Ok(())
    }

    async fn find_content(
        &self,
        kind: ResourceKind,
        id: &str,
    ) -> Result<Option<ContentItem>, ServiceError> {
        Ok(lock(&self.content)?.get(&(kind, id.to_string())).cloned())
    }

    async fn list_content(
        &self,
        kind: ResourceKind,
        organization: Option<&str>,
    ) -> Result<Vec<ContentItem>, ServiceError> {
        let mut items: Vec<ContentItem> = lock(&self.content)?
            .values()
            .filter(|item| item.kind == kind)
            .filter(|item| organization.is_none_or(|org| item.organization == org))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }

    async fn replace_content(&self, item: &ContentItem) -> Result<(), ServiceError> {
        let mut content = lock(&self.content)?;
        match content.get_mut(&(item.kind, item.id.clone())) {
            Some(existing) => {
                *existing = item.clone();
                Ok(())
            }
            None => Err(ServiceError::NotFound("Content")),
        }
    }

    async fn delete_content(&self, kind: ResourceKind, id: &str) -> Result<bool, ServiceError> {
        Ok(lock(&self.content)?
            .remove(&(kind, id.to_string()))
            .is_some())
    }

    async fn delete_organization_content(&self, organization: &str) -> Result<u64, ServiceError> {
        let mut content = lock(&self.content)?;
        let before = content.len();
        content.retain(|_, item| item.organization != organization);
        Ok((before - content.len()) as u64)
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn health_check(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::utils::hash_token;
    use chrono::Duration;

    fn user(email: &str) -> User {
        User::new(
            email.to_string(),
            "$argon2id$old".to_string(),
            None,
            Role::User,
            None,
        )
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let store = InMemoryStore::new();
        store.insert_user(&user("a@example.com")).await.unwrap();

        let result = store.insert_user(&user("a@example.com")).await;
        assert!(matches!(result, Err(ServiceError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_consume_grant_is_single_use() {
        let store = InMemoryStore::new();
        let u = user("a@example.com");
        store.insert_user(&u).await.unwrap();

        let now = Utc::now();
        let grant = TokenGrant::issue("raw", now, Duration::minutes(10));
        store
            .set_grant(&u.id, GrantKind::PasswordReset, &grant)
            .await
            .unwrap();

        let effect = GrantEffect::SetPassword("$argon2id$new".to_string());
        let first = store
            .consume_grant(GrantKind::PasswordReset, &hash_token("raw"), now, effect.clone())
            .await
            .unwrap();
        assert_eq!(first.map(|u| u.password_hash), Some("$argon2id$new".to_string()));

        let second = store
            .consume_grant(GrantKind::PasswordReset, &hash_token("raw"), now, effect)
            .await
            .unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn test_consume_grant_rejects_expired_and_wrong_kind() {
        let store = InMemoryStore::new();
        let u = user("a@example.com");
        store.insert_user(&u).await.unwrap();

        let now = Utc::now();
        let grant = TokenGrant::issue("raw", now, Duration::minutes(10));
        store
            .set_grant(&u.id, GrantKind::PasswordReset, &grant)
            .await
            .unwrap();

        let wrong_kind = store
            .consume_grant(
                GrantKind::EmailVerification,
                &hash_token("raw"),
                now,
                GrantEffect::MarkVerified,
            )
            .await
            .unwrap();
        assert!(wrong_kind.is_none());

        let expired = store
            .consume_grant(
                GrantKind::PasswordReset,
                &hash_token("raw"),
                now + Duration::minutes(10),
                GrantEffect::SetPassword("$argon2id$new".to_string()),
            )
            .await
            .unwrap();
        assert!(expired.is_none());
    }

    #[tokio::test]
    async fn test_field_update_after_consumed_grant_keeps_credentials() {
        let store = InMemoryStore::new();
        let u = user("a@example.com");
        store.insert_user(&u).await.unwrap();

        let now = Utc::now();
        let grant = TokenGrant::issue("raw", now, Duration::minutes(10));
        store
            .set_grant(&u.id, GrantKind::PasswordReset, &grant)
            .await
            .unwrap();

        // An admin loaded the identity before the grant was spent.
        let stale = store.find_user_by_id(&u.id).await.unwrap().unwrap();
        assert!(stale.password_reset.is_some());

        let effect = GrantEffect::SetPassword("$argon2id$new".to_string());
        store
            .consume_grant(GrantKind::PasswordReset, &hash_token("raw"), now, effect.clone())
            .await
            .unwrap()
            .unwrap();

        let update = UserUpdate {
            active: Some(!stale.active),
            role: Some(Role::Consultant),
            ..UserUpdate::default()
        };
        let updated = store.update_user(&u.id, &update, now).await.unwrap();
        assert_eq!(updated.password_hash, "$argon2id$new");
        assert!(updated.password_reset.is_none());
        assert_eq!(updated.role, Role::Consultant);

        let replay = store
            .consume_grant(GrantKind::PasswordReset, &hash_token("raw"), now, effect)
            .await
            .unwrap();
        assert!(replay.is_none());
    }

    #[tokio::test]
    async fn test_email_change_drops_only_verification_grant() {
        let store = InMemoryStore::new();
        let mut u = user("a@example.com");
        u.verified = true;
        store.insert_user(&u).await.unwrap();

        let now = Utc::now();
        let verification = TokenGrant::issue("verify", now, Duration::hours(24));
        let reset = TokenGrant::issue("reset", now, Duration::minutes(10));
        store
            .set_grant(&u.id, GrantKind::EmailVerification, &verification)
            .await
            .unwrap();
        store
            .set_grant(&u.id, GrantKind::PasswordReset, &reset)
            .await
            .unwrap();

        let update = UserUpdate {
            email: Some("b@example.com".to_string()),
            ..UserUpdate::default()
        };
        let updated = store.update_user(&u.id, &update, now).await.unwrap();
        assert_eq!(updated.email, "b@example.com");
        assert!(!updated.verified);
        assert!(updated.verification.is_none());
        assert!(updated.password_reset.is_some());
        assert_eq!(updated.password_hash, "$argon2id$old");
    }

    #[tokio::test]
    async fn test_email_update_to_taken_address_conflicts() {
        let store = InMemoryStore::new();
        let a = user("a@example.com");
        store.insert_user(&a).await.unwrap();
        store.insert_user(&user("b@example.com")).await.unwrap();

        let update = UserUpdate {
            email: Some("b@example.com".to_string()),
            ..UserUpdate::default()
        };
        let result = store.update_user(&a.id, &update, Utc::now()).await;
        assert!(matches!(result, Err(ServiceError::Conflict(_))));

        let missing = store.update_user("nope", &UserUpdate::default(), Utc::now()).await;
        assert!(matches!(missing, Err(ServiceError::NotFound(_))));
    }
}
