use chrono::Utc;
use std::sync::Arc;

use super::auth::{hash_new_password, AuthService};
use super::error::ServiceError;
use super::policy::{authorize, is_platform_admin, OperationClass, Target};
use super::store::{IdentityStore, OrganizationStore, Store, UserUpdate};
use crate::dtos::users::{CreateUserRequest, UpdateProfileRequest};
use crate::models::{normalize_email, Identity, Member, MemberRole, Role, SanitizedUser, User};

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn Store>,
    auth: AuthService,
}

impl UserService {
    pub fn new(store: Arc<dyn Store>, auth: AuthService) -> Self {
        Self { store, auth }
    }

    async fn load(&self, id: &str) -> Result<User, ServiceError> {
        self.store
            .find_user_by_id(id)
            .await?
            .ok_or(ServiceError::NotFound("User"))
    }

    pub async fn me(&self, identity: &Identity) -> Result<SanitizedUser, ServiceError> {
        Ok(self.load(&identity.id).await?.sanitized())
    }

    pub async fn update_profile(
        &self,
        identity: &Identity,
        req: UpdateProfileRequest,
    ) -> Result<SanitizedUser, ServiceError> {
        let current = self.load(&identity.id).await?;
        let email = req
            .email
            .as_deref()
            .map(normalize_email)
            .filter(|email| *email != current.email);
        let email_changed = email.is_some();

        let update = UserUpdate {
            name: req.name,
            email,
            ..UserUpdate::default()
        };
        let user = self
            .store
            .update_user(&identity.id, &update, Utc::now())
            .await?;
        tracing::info!(user_id = %user.id, email_changed, "Profile updated");

        if email_changed {
            if let Err(e) = self.auth.resend_verification(identity).await {
                tracing::warn!(user_id = %user.id, error = %e, "Verification email not sent");
            }
        }

        Ok(user.sanitized())
    }

    /// Platform admins list everyone (optionally one tenant); organization
    /// admins list their own tenant.
    pub async fn list(
        &self,
        identity: &Identity,
        organization: Option<String>,
    ) -> Result<Vec<SanitizedUser>, ServiceError> {
        let scope = if is_platform_admin(identity) {
            organization
        } else {
            let own = identity
                .organization
                .clone()
                .ok_or_else(|| ServiceError::unauthorized("Not a member of any organization"))?;
            if organization.as_deref().is_some_and(|requested| requested != own) {
                return Err(ServiceError::unauthorized("Not a member of this organization"));
            }
            let org = self
                .store
                .find_organization(&own)
                .await?
                .ok_or(ServiceError::NotFound("Organization"))?;
            authorize(identity, Target::from(&org), OperationClass::Administer)?;
            Some(own)
        };

        let users = self.store.list_users(scope.as_deref()).await?;
        Ok(users.into_iter().map(SanitizedUser::from).collect())
    }

    pub async fn get(&self, identity: &Identity, id: &str) -> Result<SanitizedUser, ServiceError> {
        if identity.id == id {
            return self.me(identity).await;
        }

        let user = self.load(id).await?;
        match user.organization.as_deref() {
            Some(org_id) => {
                let org = self
                    .store
                    .find_organization(org_id)
                    .await?
                    .ok_or(ServiceError::NotFound("Organization"))?;
                authorize(identity, Target::from(&org), OperationClass::Administer)?;
            }
            None => authorize(identity, Target::Platform, OperationClass::PlatformWide)?,
        }
        Ok(user.sanitized())
    }

    /// Admin-created identity. Platform roles and organization-less users need
    /// a platform admin; otherwise an admin of the target organization suffices.
    pub async fn create(
        &self,
        identity: &Identity,
        req: CreateUserRequest,
    ) -> Result<SanitizedUser, ServiceError> {
        let platform_role = matches!(req.role, Role::Admin | Role::SuperAdmin);
        if platform_role {
            authorize(identity, Target::Platform, OperationClass::PlatformWide)?;
        }
        if req.role == Role::SuperAdmin && identity.role != Role::SuperAdmin {
            return Err(ServiceError::unauthorized(
                "Only a super-admin may create super-admins",
            ));
        }

        let mut org = match req.organization.as_deref() {
            Some(org_id) => {
                let org = self
                    .store
                    .find_organization(org_id)
                    .await?
                    .ok_or(ServiceError::NotFound("Organization"))?;
                authorize(identity, Target::from(&org), OperationClass::Administer)?;
                Some(org)
            }
            None => {
                authorize(identity, Target::Platform, OperationClass::PlatformWide)?;
                None
            }
        };

        let user = User::new(
            normalize_email(&req.email),
            hash_new_password(&req.password)?,
            req.name,
            req.role,
            req.organization,
        );
        self.store.insert_user(&user).await?;

        if let Some(org) = org.as_mut() {
            org.members.push(Member {
                user: user.id.clone(),
                role: MemberRole::Member,
                joined_at: Utc::now(),
            });
            org.updated_at = Utc::now();
            self.store.replace_organization(org).await?;
        }

        tracing::info!(
            user_id = %user.id,
            created_by = %identity.id,
            role = %user.role,
            "User created by admin"
        );
        Ok(user.sanitized())
    }

    pub async fn set_status(
        &self,
        identity: &Identity,
        id: &str,
        active: bool,
    ) -> Result<SanitizedUser, ServiceError> {
        authorize(identity, Target::Platform, OperationClass::PlatformWide)?;
        if identity.id == id && !active {
            return Err(ServiceError::Validation(
                "Cannot deactivate your own account".to_string(),
            ));
        }

        let update = UserUpdate {
            active: Some(active),
            ..UserUpdate::default()
        };
        let user = self.store.update_user(id, &update, Utc::now()).await?;

        tracing::info!(user_id = %id, active, changed_by = %identity.id, "User status changed");
        Ok(user.sanitized())
    }

    pub async fn set_role(
        &self,
        identity: &Identity,
        id: &str,
        role: Role,
    ) -> Result<SanitizedUser, ServiceError> {
        authorize(identity, Target::Platform, OperationClass::PlatformWide)?;

        let current = self.load(id).await?;
        if (role == Role::SuperAdmin || current.role == Role::SuperAdmin)
            && identity.role != Role::SuperAdmin
        {
            return Err(ServiceError::unauthorized(
                "Only a super-admin may grant or revoke super-admin",
            ));
        }

        let update = UserUpdate {
            role: Some(role),
            ..UserUpdate::default()
        };
        let user = self.store.update_user(id, &update, Utc::now()).await?;

        tracing::info!(user_id = %id, role = %role, changed_by = %identity.id, "User role changed");
        Ok(user.sanitized())
    }
}
