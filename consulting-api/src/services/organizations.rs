use chrono::Utc;
use std::sync::Arc;

use super::error::ServiceError;
use super::policy::{authorize, is_platform_admin, OperationClass, Target};
use super::store::{ContentStore, IdentityStore, OrganizationStore, Store};
use crate::dtos::organizations::{
    AddMemberRequest, ContactRequest, CreateOrganizationRequest, UpdateOrganizationRequest,
};
use crate::models::{ContentItem, Identity, Member, MemberRole, Organization, ResourceKind};
use crate::utils::slugify;

/// Tenants and their membership lists.
#[derive(Clone)]
pub struct OrganizationService {
    store: Arc<dyn Store>,
}

impl OrganizationService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    async fn load(&self, id: &str) -> Result<Organization, ServiceError> {
        self.store
            .find_organization(id)
            .await?
            .ok_or(ServiceError::NotFound("Organization"))
    }

    /// Any identity without an organization may found one and becomes its
    /// owner. An identity belongs to at most one organization, platform
    /// admins included.
    pub async fn create(
        &self,
        identity: &Identity,
        req: CreateOrganizationRequest,
    ) -> Result<Organization, ServiceError> {
        if identity.organization.is_some() {
            return Err(ServiceError::unauthorized(
                "Already a member of an organization",
            ));
        }

        let slug = slugify(req.slug.as_deref().unwrap_or(&req.name));
        if slug.is_empty() {
            return Err(ServiceError::Validation(
                "Organization name must contain letters or digits".to_string(),
            ));
        }

        let mut org = Organization::new(req.name, slug, identity.id.clone());
        org.description = req.description;
        org.website = req.website;
        self.store.insert_organization(&org).await?;

        self.store
            .set_user_organization(&identity.id, Some(&org.id))
            .await?;

        tracing::info!(organization_id = %org.id, owner = %identity.id, slug = %org.slug, "Organization created");
        Ok(org)
    }

    pub async fn list(&self, identity: &Identity) -> Result<Vec<Organization>, ServiceError> {
        if is_platform_admin(identity) {
            return self.store.list_organizations().await;
        }

        match identity.organization() {
            Some(org_id) => Ok(self.store.find_organization(org_id).await?.into_iter().collect()),
            None => Ok(Vec::new()),
        }
    }

    pub async fn get(&self, identity: &Identity, id: &str) -> Result<Organization, ServiceError> {
        let org = self.load(id).await?;
        authorize(identity, Target::from(&org), OperationClass::Read)?;
        Ok(org)
    }

    pub async fn update(
        &self,
        identity: &Identity,
        id: &str,
        req: UpdateOrganizationRequest,
    ) -> Result<Organization, ServiceError> {
        let mut org = self.load(id).await?;
        authorize(identity, Target::from(&org), OperationClass::Administer)?;

        if let Some(name) = req.name {
            org.name = name;
        }
        if let Some(description) = req.description {
            org.description = Some(description);
        }
        if let Some(website) = req.website {
            org.website = Some(website);
        }
        org.updated_at = Utc::now();

        self.store.replace_organization(&org).await?;
        tracing::info!(organization_id = %org.id, updated_by = %identity.id, "Organization updated");
        Ok(org)
    }

    /// Deletes the organization and its content and detaches its users.
    pub async fn delete(&self, identity: &Identity, id: &str) -> Result<(), ServiceError> {
        let org = self.load(id).await?;
        authorize(identity, Target::from(&org), OperationClass::Administer)?;

        let removed_content = self.store.delete_organization_content(&org.id).await?;
        for user in self.store.list_users(Some(&org.id)).await? {
            self.store.set_user_organization(&user.id, None).await?;
        }
        self.store.delete_organization(&org.id).await?;

        tracing::info!(
            organization_id = %org.id,
            deleted_by = %identity.id,
            removed_content,
            "Organization deleted"
        );
        Ok(())
    }

    pub async fn add_member(
        &self,
        identity: &Identity,
        org_id: &str,
        req: AddMemberRequest,
    ) -> Result<Organization, ServiceError> {
        let mut org = self.load(org_id).await?;
        authorize(identity, Target::from(&org), OperationClass::Administer)?;

        if req.role == MemberRole::Owner {
            return Err(ServiceError::Validation(
                "An organization has exactly one owner".to_string(),
            ));
        }

        let user = self
            .store
            .find_user_by_id(&req.user_id)
            .await?
            .ok_or(ServiceError::NotFound("User"))?;

        if user
            .organization
            .as_deref()
            .is_some_and(|current| current != org.id)
        {
            return Err(ServiceError::Conflict(
                "User belongs to another organization".to_string(),
            ));
        }
        if org.member(&user.id).is_some() || org.is_owner(&user.id) {
            return Err(ServiceError::Conflict("User is already a member".to_string()));
        }

        org.members.push(Member {
            user: user.id.clone(),
            role: req.role,
            joined_at: Utc::now(),
        });
        org.updated_at = Utc::now();
        self.store.replace_organization(&org).await?;
        self.store
            .set_user_organization(&user.id, Some(&org.id))
            .await?;

        tracing::info!(organization_id = %org.id, user_id = %user.id, role = ?req.role, "Member added");
        Ok(org)
    }

    pub async fn update_member(
        &self,
        identity: &Identity,
        org_id: &str,
        user_id: &str,
        role: MemberRole,
    ) -> Result<Organization, ServiceError> {
        let mut org = self.load(org_id).await?;
        authorize(identity, Target::from(&org), OperationClass::Administer)?;

        if role == MemberRole::Owner || org.is_owner(user_id) {
            return Err(ServiceError::Validation(
                "Ownership cannot be changed through membership".to_string(),
            ));
        }

        let member = org
            .members
            .iter_mut()
            .find(|m| m.user == user_id)
            .ok_or(ServiceError::NotFound("Member"))?;
        member.role = role;
        org.updated_at = Utc::now();
        self.store.replace_organization(&org).await?;

        tracing::info!(organization_id = %org.id, user_id = %user_id, role = ?role, "Member role changed");
        Ok(org)
    }

    /// Admins may remove anyone but the owner; members may remove themselves.
    pub async fn remove_member(
        &self,
        identity: &Identity,
        org_id: &str,
        user_id: &str,
    ) -> Result<Organization, ServiceError> {
        let mut org = self.load(org_id).await?;
        if identity.id != user_id {
            authorize(identity, Target::from(&org), OperationClass::Administer)?;
        }

        if org.is_owner(user_id) {
            return Err(ServiceError::Validation(
                "The owner cannot be removed".to_string(),
            ));
        }

        let before = org.members.len();
        org.members.retain(|m| m.user != user_id);
        if org.members.len() == before {
            return Err(ServiceError::NotFound("Member"));
        }
        org.updated_at = Utc::now();
        self.store.replace_organization(&org).await?;

        if let Some(user) = self.store.find_user_by_id(user_id).await? {
            if user.organization.as_deref() == Some(org.id.as_str()) {
                self.store.set_user_organization(user_id, None).await?;
            }
        }

        tracing::info!(organization_id = %org.id, user_id = %user_id, removed_by = %identity.id, "Member removed");
        Ok(org)
    }

    /// Public contact form. Stored as a contact submission of the organization.
    pub async fn submit_contact(
        &self,
        org_id: &str,
        req: ContactRequest,
    ) -> Result<ContentItem, ServiceError> {
        let org = self.load(org_id).await?;

        let mut item = ContentItem::new(
            ResourceKind::ContactSubmission,
            org.id.clone(),
            format!("Contact from {}", req.name),
            None,
        );
        item.body = Some(req.message);
        item.attributes.insert("name".into(), req.name.into());
        item.attributes.insert("email".into(), req.email.into());
        if let Some(company) = req.company {
            item.attributes.insert("company".into(), company.into());
        }
        self.store.insert_content(&item).await?;

        tracing::info!(organization_id = %org.id, submission_id = %item.id, "Contact submission received");
        Ok(item)
    }
}
