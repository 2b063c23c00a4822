use serde::Serialize;

use super::{Role, User};

/// The authenticated caller, resolved by the authentication gate from live
/// store state and attached to the request for handlers and the policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub id: String,
    pub email: String,
    pub role: Role,
    pub organization: Option<String>,
    pub active: bool,
}

impl Identity {
    pub fn organization(&self) -> Option<&str> {
        self.organization.as_deref()
    }
}

impl From<&User> for Identity {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            role: user.role,
            organization: user.organization.clone(),
            active: user.active,
        }
    }
}
