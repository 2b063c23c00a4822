//! Authorization policy.
//!
//! Every role and tenant check in the service goes through this module. The
//! predicates are pure functions over the caller's [`Identity`] and the
//! target's organization, so they never touch the store. Services resolve the
//! target first and then call [`authorize`] with the operation class they are
//! about to perform.

use crate::models::{Identity, Organization, Role, TenantScoped};

use super::error::ServiceError;

/// Platform-wide administrators see and manage every tenant.
pub fn is_platform_admin(identity: &Identity) -> bool {
    matches!(identity.role, Role::Admin | Role::SuperAdmin)
}

pub fn belongs_to_organization(identity: &Identity, organization_id: &str) -> bool {
    identity.organization() == Some(organization_id) || is_platform_admin(identity)
}

/// The owner counts as an admin even when missing from the member list.
pub fn is_organization_admin(identity: &Identity, organization: &Organization) -> bool {
    organization.is_owner(&identity.id)
        || organization
            .member(&identity.id)
            .is_some_and(|m| m.role.is_admin())
        || is_platform_admin(identity)
}

/// Content creators (consultants and admins) may edit their own tenant's resources.
pub fn owns_or_can_manage<R>(identity: &Identity, resource: &R) -> bool
where
    R: TenantScoped + ?Sized,
{
    let same_tenant = identity.organization() == Some(resource.organization_id());
    let creator_role = matches!(
        identity.role,
        Role::Consultant | Role::Admin | Role::SuperAdmin
    );

    (same_tenant && creator_role) || is_platform_admin(identity)
}

/// What an operation does to its target. Each class maps to one predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationClass {
    /// View tenant data: [`belongs_to_organization`]
    Read,
    /// Create, edit or delete tenant content: [`owns_or_can_manage`]
    Manage,
    /// Change the organization itself or its members: [`is_organization_admin`]
    Administer,
    /// Cross-tenant operations: [`is_platform_admin`]
    PlatformWide,
}

/// The thing an operation acts on.
#[derive(Clone, Copy)]
pub enum Target<'a> {
    Platform,
    /// An organization known only by id.
    Tenant(&'a str),
    Organization(&'a Organization),
    Resource(&'a dyn TenantScoped),
}

impl<'a> Target<'a> {
    fn organization_id(&self) -> Option<&'a str> {
        match *self {
            Target::Platform => None,
            Target::Tenant(id) => Some(id),
            Target::Organization(org) => Some(org.id.as_str()),
            Target::Resource(resource) => Some(resource.organization_id()),
        }
    }
}

impl<'a> From<&'a Organization> for Target<'a> {
    fn from(org: &'a Organization) -> Self {
        Target::Organization(org)
    }
}

/// Evaluate the predicate for `operation` and turn a denial into
/// [`ServiceError::Unauthorized`].
pub fn authorize(
    identity: &Identity,
    target: Target<'_>,
    operation: OperationClass,
) -> Result<(), ServiceError> {
    let allowed = match (operation, target) {
        (OperationClass::PlatformWide, _) | (_, Target::Platform) => is_platform_admin(identity),
        (OperationClass::Administer, Target::Organization(org)) => {
            is_organization_admin(identity, org)
        }
        // Without the organization record there is no member list to consult.
        (OperationClass::Administer, Target::Tenant(_) | Target::Resource(_)) => {
            is_platform_admin(identity)
        }
        (OperationClass::Read, target) => target
            .organization_id()
            .is_some_and(|org_id| belongs_to_organization(identity, org_id)),
        (OperationClass::Manage, target) => target
            .organization_id()
            .is_some_and(|org_id| owns_or_can_manage(identity, org_id)),
    };

    if allowed {
        Ok(())
    } else {
        tracing::info!(
            user_id = %identity.id,
            role = %identity.role,
            operation = ?operation,
            organization = ?target.organization_id(),
            "Authorization denied"
        );
        Err(ServiceError::unauthorized(denial_reason(operation)))
    }
}

fn denial_reason(operation: OperationClass) -> &'static str {
    match operation {
        OperationClass::Read => "Not a member of this organization",
        OperationClass::Manage => "Insufficient rights to manage this resource",
        OperationClass::Administer => "Organization admin rights required",
        OperationClass::PlatformWide => "Platform admin rights required",
    }
}
