use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateContentRequest {
    /// Target organization; defaults to the caller's own.
    pub organization: Option<String>,

    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    #[schema(example = "ERP rollout for a regional retailer")]
    pub title: String,

    #[validate(length(min = 1, max = 200, message = "Slug must be 1-200 characters"))]
    pub slug: Option<String>,

    #[validate(length(max = 1000, message = "Summary must be at most 1000 characters"))]
    pub summary: Option<String>,

    pub body: Option<String>,

    #[serde(default)]
    #[schema(value_type = Object)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateContentRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: Option<String>,

    #[validate(length(min = 1, max = 200, message = "Slug must be 1-200 characters"))]
    pub slug: Option<String>,

    #[validate(length(max = 1000, message = "Summary must be at most 1000 characters"))]
    pub summary: Option<String>,

    pub body: Option<String>,

    /// Merged key by key into the stored attributes.
    #[schema(value_type = Option<Object>)]
    pub attributes: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ContentListQuery {
    /// Tenant to list; platform admins may choose any, others only their own
    pub organization: Option<String>,
}
