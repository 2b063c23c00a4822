pub mod content;
pub mod identity;
pub mod organization;
pub mod token_grant;
pub mod user;

pub use content::{ContentItem, ResourceKind, TenantScoped};
pub use identity::Identity;
pub use organization::{Member, MemberRole, Organization};
pub use token_grant::{GrantKind, TokenGrant};
pub use user::{normalize_email, Role, SanitizedUser, User};
