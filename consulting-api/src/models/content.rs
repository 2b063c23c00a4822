//! Tenant-scoped content: everything an organization publishes or receives.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Kinds of organization-scoped resources, each stored in its own collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    Project,
    CaseStudy,
    Service,
    BlogPost,
    ContactSubmission,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 5] = [
        ResourceKind::Project,
        ResourceKind::CaseStudy,
        ResourceKind::Service,
        ResourceKind::BlogPost,
        ResourceKind::ContactSubmission,
    ];

    pub fn collection(&self) -> &'static str {
        match self {
            ResourceKind::Project => "projects",
            ResourceKind::CaseStudy => "case_studies",
            ResourceKind::Service => "services",
            ResourceKind::BlogPost => "blog_posts",
            ResourceKind::ContactSubmission => "contact_submissions",
        }
    }

    /// URL path segment, e.g. `/content/case-studies`.
    pub fn path_segment(&self) -> &'static str {
        match self {
            ResourceKind::Project => "projects",
            ResourceKind::CaseStudy => "case-studies",
            ResourceKind::Service => "services",
            ResourceKind::BlogPost => "blog-posts",
            ResourceKind::ContactSubmission => "contact-submissions",
        }
    }

    pub fn from_path_segment(segment: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.path_segment() == segment)
    }

    /// Kinds whose records carry a URL slug derived from the title.
    pub fn has_slug(&self) -> bool {
        matches!(
            self,
            ResourceKind::CaseStudy | ResourceKind::Service | ResourceKind::BlogPost
        )
    }
}

/// Anything owned by exactly one organization.
pub trait TenantScoped {
    fn organization_id(&self) -> &str;
}

impl TenantScoped for str {
    fn organization_id(&self) -> &str {
        self
    }
}

impl TenantScoped for String {
    fn organization_id(&self) -> &str {
        self
    }
}

/// A piece of organization content. Kind-specific fields live in `attributes`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ContentItem {
    #[serde(rename = "_id")]
    pub id: String,

    pub kind: ResourceKind,

    /// Owning organization id
    pub organization: String,

    #[schema(example = "Supply chain modernization")]
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,

    #[serde(default)]
    pub summary: Option<String>,

    #[serde(default)]
    pub body: Option<String>,

    #[serde(default)]
    #[schema(value_type = Object)]
    pub attributes: serde_json::Map<String, serde_json::Value>,

    /// Identity id of the creator; absent for public contact submissions
    #[serde(default)]
    pub created_by: Option<String>,

    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl ContentItem {
    /// Bare item; callers fill in slug, summary, body and attributes.
    pub fn new(
        kind: ResourceKind,
        organization: String,
        title: String,
        created_by: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            organization,
            title,
            slug: None,
            summary: None,
            body: None,
            attributes: serde_json::Map::new(),
            created_by,
            created_at: now,
            updated_at: now,
        }
    }
}

impl TenantScoped for ContentItem {
    fn organization_id(&self) -> &str {
        &self.organization
    }
}
