use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Role of a member inside one organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Owner,
    Admin,
    Member,
    Guest,
}

impl MemberRole {
    /// Owner and admin members may manage the organization.
    pub fn is_admin(&self) -> bool {
        matches!(self, MemberRole::Owner | MemberRole::Admin)
    }
}

/// An entry in an organization's member list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Member {
    /// Identity id of the member
    #[schema(example = "550e8400-e29b-41d4-a716-446655440000")]
    pub user: String,
    pub role: MemberRole,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub joined_at: DateTime<Utc>,
}

/// A tenant: a consulting firm or client company using the platform.
///
/// The owner is implicitly an admin member even when absent from `members`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Organization {
    #[serde(rename = "_id")]
    #[schema(example = "660e8400-e29b-41d4-a716-446655440001")]
    pub id: String,

    #[schema(example = "Acme Consulting")]
    pub name: String,

    #[schema(example = "acme-consulting")]
    pub slug: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub website: Option<String>,

    /// Identity id of the owner
    pub owner: String,

    /// Ordered member list
    #[serde(default)]
    pub members: Vec<Member>,

    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Organization {
    /// New organization owned by `owner`, who is also recorded as the first member.
    pub fn new(name: String, slug: String, owner: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            slug,
            description: None,
            website: None,
            members: vec![Member {
                user: owner.clone(),
                role: MemberRole::Owner,
                joined_at: now,
            }],
            owner,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn member(&self, user_id: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.user == user_id)
    }

    pub fn is_owner(&self, user_id: &str) -> bool {
        self.owner == user_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_organization_lists_owner() {
        let org = Organization::new("Acme".to_string(), "acme".to_string(), "u1".to_string());
        assert!(org.is_owner("u1"));
        assert_eq!(org.member("u1").map(|m| m.role), Some(MemberRole::Owner));
        assert!(org.member("u2").is_none());
    }

    #[test]
    fn test_member_role_admin_rights() {
        assert!(MemberRole::Owner.is_admin());
        assert!(MemberRole::Admin.is_admin());
        assert!(!MemberRole::Member.is_admin());
        assert!(!MemberRole::Guest.is_admin());
    }
}
