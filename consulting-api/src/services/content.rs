use chrono::Utc;
use std::sync::Arc;

use super::error::ServiceError;
use super::policy::{authorize, is_platform_admin, OperationClass, Target};
use super::store::{ContentStore, OrganizationStore, Store};
use crate::dtos::content::{CreateContentRequest, UpdateContentRequest};
use crate::models::{ContentItem, Identity, ResourceKind};
use crate::utils::slugify;

fn content_slug(raw: &str) -> Result<String, ServiceError> {
    let slug = slugify(raw);
    if slug.is_empty() {
        return Err(ServiceError::Validation(
            "Slug must contain letters or digits".to_string(),
        ));
    }
    Ok(slug)
}

/// Projects, case studies, services, blog posts and contact submissions.
/// Every call is checked against the caller's organization.
#[derive(Clone)]
pub struct ContentService {
    store: Arc<dyn Store>,
}

impl ContentService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    async fn load(&self, kind: ResourceKind, id: &str) -> Result<ContentItem, ServiceError> {
        self.store
            .find_content(kind, id)
            .await?
            .ok_or(ServiceError::NotFound("Content"))
    }

    pub async fn list(
        &self,
        identity: &Identity,
        kind: ResourceKind,
        organization: Option<String>,
    ) -> Result<Vec<ContentItem>, ServiceError> {
        let scope = match organization {
            Some(org_id) => {
                authorize(identity, Target::Tenant(&org_id), OperationClass::Read)?;
                Some(org_id)
            }
            None if is_platform_admin(identity) => None,
            None => match identity.organization.clone() {
                Some(own) => Some(own),
                None => return Ok(Vec::new()),
            },
        };

        self.store.list_content(kind, scope.as_deref()).await
    }

    pub async fn create(
        &self,
        identity: &Identity,
        kind: ResourceKind,
        req: CreateContentRequest,
    ) -> Result<ContentItem, ServiceError> {
        let org_id = req
            .organization
            .or_else(|| identity.organization.clone())
            .ok_or_else(|| ServiceError::Validation("organization is required".to_string()))?;

        authorize(identity, Target::Tenant(&org_id), OperationClass::Manage)?;
        if self.store.find_organization(&org_id).await?.is_none() {
            return Err(ServiceError::NotFound("Organization"));
        }

        let mut item = ContentItem::new(kind, org_id, req.title, Some(identity.id.clone()));
        if kind.has_slug() {
            item.slug = Some(content_slug(req.slug.as_deref().unwrap_or(&item.title))?);
        }
        item.summary = req.summary;
        item.body = req.body;
        item.attributes = req.attributes;

        self.store.insert_content(&item).await?;
        tracing::info!(
            content_id = %item.id,
            kind = ?kind,
            organization_id = %item.organization,
            created_by = %identity.id,
            "Content created"
        );
        Ok(item)
    }

    pub async fn get(
        &self,
        identity: &Identity,
        kind: ResourceKind,
        id: &str,
    ) -> Result<ContentItem, ServiceError> {
        let item = self.load(kind, id).await?;
        authorize(identity, Target::Resource(&item), OperationClass::Read)?;
        Ok(item)
    }

    pub async fn update(
        &self,
        identity: &Identity,
        kind: ResourceKind,
        id: &str,
        req: UpdateContentRequest,
    ) -> Result<ContentItem, ServiceError> {
        let mut item = self.load(kind, id).await?;
        authorize(identity, Target::Resource(&item), OperationClass::Manage)?;

        if let Some(title) = req.title {
            item.title = title;
        }
        if kind.has_slug() {
            if let Some(slug) = req.slug {
                item.slug = Some(content_slug(&slug)?);
            }
        }
        if let Some(summary) = req.summary {
            item.summary = Some(summary);
        }
        if let Some(body) = req.body {
            item.body = Some(body);
        }
        if let Some(attributes) = req.attributes {
            item.attributes.extend(attributes);
        }
        item.updated_at = Utc::now();

        self.store.replace_content(&item).await?;
        tracing::info!(content_id = %item.id, kind = ?kind, updated_by = %identity.id, "Content updated");
        Ok(item)
    }

    pub async fn delete(
        &self,
        identity: &Identity,
        kind: ResourceKind,
        id: &str,
    ) -> Result<(), ServiceError> {
        let item = self.load(kind, id).await?;
        authorize(identity, Target::Resource(&item), OperationClass::Manage)?;

        self.store.delete_content(kind, id).await?;
        tracing::info!(content_id = %id, kind = ?kind, deleted_by = %identity.id, "Content deleted");
        Ok(())
    }
}
